//! lescan: BLE scan manager.
//!
//! Many independent clients each register a logical scanner; the manager
//! merges them onto the one physical radio scan, filters and de-duplicates
//! advertisement reports per scanner, and reports lifecycle status.
//!
//! The library is `no_std` and allocation-free so it runs both inside the
//! nRF52840 firmware (`src/main.rs`, feature `embedded`) and on the host
//! for `cargo test`.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod scan;

pub use error::{RadioError, ScanError};
pub use scan::sink::{ChannelSink, ScanEvent};
pub use scan::radio::{ChannelRadio, RadioCommand, RadioEvent};
pub use scan::{
    BtInstance, Clock, InstanceId, ScanFilter, ScanManager, ScanMode, ScanSettings, ScanStatus, ScannerCallbacks,
    ScannerHandle,
};
