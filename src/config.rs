//! Compile-time configuration.
//!
//! Capacities, radio timing tables and channel depths live here so they
//! can be tuned in one place.

// Scanner registry

/// Maximum number of logical scanners registered at once.
pub const MAX_SCANNERS: usize = 8;

/// Maximum number of service UUIDs a scan filter may carry.
pub const BLE_SCAN_FILTER_UUID_MAX_NUM: usize = 2;

/// Addresses remembered per scanner for duplicate suppression.
pub const DUPLICATE_CACHE_SIZE: usize = 16;

// Scan mode table (0.625 ms units)

pub const SCAN_MODE_LOW_POWER_INTERVAL: u16 = 0x1000;
pub const SCAN_MODE_LOW_POWER_WINDOW: u16 = 0x100;
pub const SCAN_MODE_BALANCED_INTERVAL: u16 = 0x500;
pub const SCAN_MODE_BALANCED_WINDOW: u16 = 0x140;
pub const SCAN_MODE_LOW_LATENCY_INTERVAL: u16 = 0xA0;
pub const SCAN_MODE_LOW_LATENCY_WINDOW: u16 = 0xA0;

/// Controller limits for LE scan interval and window (2.5 ms .. 10.24 s).
pub const SCAN_INTERVAL_MIN: u16 = 0x0004;
pub const SCAN_INTERVAL_MAX: u16 = 0x4000;

// Advertisement data

/// Largest advertisement payload carried by a scan result (length is a `u8`).
pub const ADV_DATA_MAX_LEN: usize = 255;

// Channels

/// Depth of a `ChannelSink` event queue.
pub const SCAN_EVENT_QUEUE_DEPTH: usize = 16;

/// Slots a `ChannelSink` keeps free for start/stop events; results are
/// dropped instead of filling them.
pub const SCAN_EVENT_LIFECYCLE_RESERVE: usize = 2;

/// Depth of the manager → radio command queue.
pub const RADIO_COMMAND_DEPTH: usize = 4;

/// Depth of the radio → manager event queue (reports and acknowledgements).
pub const RADIO_EVENT_DEPTH: usize = 16;

// SoftDevice radio (firmware)

/// A SoftDevice scan still running after this long is reported as started.
pub const RADIO_START_GRACE_MS: u64 = 20;

/// Service UUID the firmware's filtered demo scanner looks for (Heart Rate).
pub const DEMO_FILTER_UUID: u16 = 0x180D;

/// Duplicate suppression window used by the firmware's demo scanner.
pub const DEMO_FILTER_PERIOD_MS: u32 = 5_000;

/// Lifetime of the firmware's active-scan demo scanner.
pub const DEMO_ACTIVE_SCAN_DURATION_MS: u32 = 30_000;
