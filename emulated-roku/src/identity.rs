//! Who the emulated device claims to be
use roku_unique::UniqueId;

/// Reported model name
pub const MODEL_NAME: &str = "Roku 4";

/// Reported model number
pub const MODEL_NUMBER: &str = "4400X";

/// The identity of one emulated device
///
/// Everything except the name and port is derived from the name, so
/// that the same configuration presents the same serial number, UUID
/// and MAC address on every boot. Created once at setup and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    device_name: String,
    serial: String,
    uuid: String,
    mac: String,
    port: u16,
}

impl DeviceIdentity {
    /// Derive the identity for a device name and HTTP port
    #[must_use]
    pub fn new(device_name: &str, port: u16) -> Self {
        let unique = UniqueId::from_seed(device_name.as_bytes());
        Self {
            device_name: device_name.to_string(),
            serial: roku_unique::serial(&unique, b"roku-serial"),
            uuid: roku_unique::uuid(&unique, b"roku-udn").to_string(),
            mac: roku_unique::format_mac(&roku_unique::mac_address(
                &unique,
                b"roku-mac",
            )),
            port,
        }
    }

    /// The user-visible name
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Twelve upper-case hex digits
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// RFC 4122 form, reported in `/query/device-info`
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Colon-separated, lower-case
    #[must_use]
    pub fn mac(&self) -> &str {
        &self.mac
    }

    /// The HTTP port the ECP server is bound to
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// [`MODEL_NAME`]
    #[must_use]
    pub fn model(&self) -> &'static str {
        MODEL_NAME
    }

    /// [`MODEL_NUMBER`]
    #[must_use]
    pub fn model_number(&self) -> &'static str {
        MODEL_NUMBER
    }

    /// `uuid:roku:ecp:<serial>`, used as UDN and SSDP USN
    #[must_use]
    pub fn unique_service_name(&self) -> String {
        format!("uuid:roku:ecp:{}", self.serial)
    }
}
