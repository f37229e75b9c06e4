//! BLE scan manager.
//!
//! Many logical scanners share one physical radio scan:
//!
//! 1. **Translator** ([`params`]) - scan mode + settings to radio parameters.
//! 2. **Filter engine** ([`filter`]) - per-scanner UUID / active / duplicate
//!    policy, backed by [`adv_parser`].
//! 3. **Registry** ([`registry`]) - scanner lifecycle and lookup.
//! 4. **Arbiter** ([`arbiter`]) - merges every live scanner into one
//!    effective radio configuration and programs the radio on change.
//! 5. **Dispatcher** ([`dispatcher`]) - fans radio reports out to scanners.
//!
//! [`ScanManager`] ties them together and is the only public entry point
//! that mutates state. Callers receive results through
//! [`ScannerCallbacks`]; [`sink::ChannelSink`] turns those into queued
//! events for a separate consumer task.

pub mod adv_parser;
pub mod arbiter;
pub mod dispatcher;
pub mod filter;
pub mod manager;
pub mod params;
pub mod radio;
pub mod registry;
pub mod result;
pub mod sink;


pub use arbiter::{Radio, RadioAck, RequestId};
pub use filter::ScanFilter;
pub use manager::ScanManager;
pub use params::{FilterPolicy, Phy, PhySet, RawScanSettings, ScanMode, ScanParams, ScanSettings, ScanType};
pub use registry::ScannerState;
pub use result::{AddrType, AdvReport, AdvType, BdAddr, DeviceType, ScanResult};

/// Opaque scanner identity handed out by the manager. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScannerHandle(u32);

impl ScannerHandle {
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw numeric identity (never 0).
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Status codes delivered through [`ScannerCallbacks::on_scan_start_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScanStatus {
    Success = 0,
    StartFail = 1,
    NoPermission = 2,
    ScannerRegNomem = 3,
    ScannerExisted = 4,
    ScannerNotFound = 5,
    ScannerRemoved = 6,
}

/// Identity of a Bluetooth client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstanceId(pub u32);

/// The Bluetooth instance layer, seen from the scan manager.
pub trait BtInstance {
    fn id(&self) -> InstanceId;

    /// Whether this client may start LE scans.
    fn has_scan_permission(&self) -> bool;

    /// Whether the adapter behind this instance has LE turned on.
    fn is_le_enabled(&self) -> bool {
        true
    }
}

/// Millisecond time source for duplicate windows and scan durations.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Per-scanner notification set.
///
/// `on_scan_result` is the one required callback; the lifecycle callbacks
/// default to no-ops. Implementations get `&self` only and must return
/// promptly - use [`sink::ChannelSink`] when the consumer may be slow.
pub trait ScannerCallbacks {
    fn on_scan_result(&self, scanner: ScannerHandle, result: &ScanResult<'_>);

    /// Outcome of a start request (or why it was refused).
    fn on_scan_start_status(&self, scanner: ScannerHandle, status: ScanStatus) {
        let _ = (scanner, status);
    }

    /// The scanner is gone; no further callbacks will name this handle.
    fn on_scan_stopped(&self, scanner: ScannerHandle) {
        let _ = scanner;
    }

    /// Stable identity of this callback set. A second registration from
    /// the same instance with the same identity, settings and filter is
    /// refused as `ScannerExisted`. `None` makes every registration a new
    /// scanner.
    fn identity(&self) -> Option<u32> {
        None
    }
}
