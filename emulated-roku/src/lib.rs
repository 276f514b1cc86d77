//! An emulated Roku device for ECP remote control
//!
//! Roku controller apps, universal remotes and home-automation hubs
//! find a Roku by SSDP, fetch its device description, and then drive
//! it with External Control Protocol requests such as
//! `POST /keypress/Home`. This crate is the device end of that:
//!
//!  - discovery is answered by [`roku_ssdp::Service`];
//!  - the description and a handful of query documents are served
//!    from [`description`];
//!  - ECP requests are parsed and routed by [`ecp`] over the
//!    non-blocking [`server::HttpServer`];
//!  - key commands become [`dispatch::KeyEvent`]s delivered, in
//!    registration order, to every [`dispatch::KeyListener`].
//!
//! [`controller::EmulatedRoku`] ties these together behind a
//! setup-then-tick lifecycle, for single-threaded polling loops:
//!
//! ```no_run
//! # use emulated_roku::{config::RokuConfig, controller::EmulatedRoku};
//! # use std::time::{Duration, Instant};
//! let mut roku = EmulatedRoku::new(&RokuConfig::default());
//! roku.on_key_press(|event_type, key| println!("{event_type} {key}"))?;
//! roku.setup(Instant::now())?;
//! loop {
//!     roku.wait(Duration::from_millis(16))?;
//!     roku.tick(Instant::now())?;
//! }
//! # Ok::<(), emulated_roku::error::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod description;
pub mod dispatch;
pub mod ecp;
pub mod error;
pub mod http;
pub mod identity;
pub mod server;

pub use controller::EmulatedRoku;
pub use error::Error;
