//! Deterministic per-device identifiers
//!
//! The roku-unique crate turns a seed (for an emulated device, its
//! configured name) into the identifiers a network device needs: a
//! serial number, a UPnP UUID and a MAC address.
//!
//! The raw seed is never used directly. Instead it is hashed into a
//! 128-bit key, and each identifier is then obtained by hashing that
//! key along with a salt that says what the identifier is for. The
//! results are consistent for any one seed and salt, so the same
//! configuration presents the same identity on every boot, but they
//! are uncorrelated between salts and between seeds.
//!
//! This does not *guarantee* uniqueness, but the odds of two
//! differently-named devices colliding involve a factor of 2^-64.
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
use core::hash::Hasher;

/// Fixed keys for turning an arbitrary-length seed into an id
const SEED_KEYS: [u64; 2] = [0x726f_6b75_2d65_6370, 0x7365_6564_2d6b_6579];

/// An object from which unique identifiers can be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueId {
    id: [u64; 2],
}

impl UniqueId {
    /// Create a new UniqueId object from a seed of any length
    ///
    /// Typically the seed is something configured, such as a device
    /// name.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> Self {
        let hash = |n: u32| {
            let mut h = siphasher::sip::SipHasher::new_with_keys(
                SEED_KEYS[0],
                SEED_KEYS[1],
            );
            h.write(seed);
            h.write_u32(n);
            h.finish()
        };
        Self {
            id: [hash(0), hash(1)],
        }
    }

    /// Return a (statistically) unique identifier for a specific purpose
    ///
    /// The `salt` string should concisely express the purpose for which the
    /// identifier is needed; i.e., identifiers for different purposes must
    /// have different salts.
    #[must_use]
    pub fn id(&self, salt: &[u8]) -> u64 {
        let mut h =
            siphasher::sip::SipHasher::new_with_keys(self.id[0], self.id[1]);
        h.write(salt);
        h.finish()
    }

    /// Return a (statistically) unique identifier for a specific purpose
    ///
    /// This is very similar to `id` but takes two `salt` values, a string
    /// and a u32, for building identifiers larger than u64; see `uuid()`.
    #[must_use]
    pub fn id2(&self, salt: &[u8], salt2: u32) -> u64 {
        let mut h =
            siphasher::sip::SipHasher::new_with_keys(self.id[0], self.id[1]);
        h.write(salt);
        h.write_u32(salt2);
        h.finish()
    }
}

/// Return a statistically-unique but consistent MAC address
///
/// The address has the locally-administered bit set and the multicast
/// bit clear, so it can never clash with a vendor-assigned one.
#[must_use]
pub fn mac_address(unique: &UniqueId, salt: &[u8]) -> [u8; 6] {
    let mut mac_address = [0u8; 6];
    let r = unique.id(salt).to_le_bytes();
    mac_address.copy_from_slice(&r[0..6]);
    mac_address[0] &= 0xFE; // clear multicast bit
    mac_address[0] |= 2; // set local bit
    mac_address
}

/// Format a MAC address the way Roku devices report it
#[must_use]
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Return a statistically-unique but consistent UUID
///
/// The result is a valid RFC 4122 variant-1, version-5-shaped UUID.
#[must_use]
pub fn uuid(unique: &UniqueId, salt: &[u8]) -> uuid::Uuid {
    let mut u1 = unique.id2(salt, 0);
    let mut u2 = unique.id2(salt, 1);
    // Variant 1
    u2 |= 0x8000_0000_0000_0000_u64;
    u2 &= !0x4000_0000_0000_0000_u64;
    // Version 5
    u1 &= !0xF000;
    u1 |= 0x5000;

    uuid::Uuid::from_u128((u128::from(u1) << 64) | u128::from(u2))
}

/// Return a statistically-unique but consistent serial number
///
/// Twelve upper-case hexadecimal digits, the shape of a Roku serial.
#[must_use]
pub fn serial(unique: &UniqueId, salt: &[u8]) -> String {
    format!("{:012X}", unique.id(salt) & 0xFFFF_FFFF_FFFF)
}
