//! Scan parameter translation.
//!
//! Maps a coarse [`ScanMode`] plus optional explicit values onto the
//! interval / window / type / PHY the radio is programmed with. Pure
//! functions, no state.

use crate::config::{
    SCAN_INTERVAL_MAX, SCAN_INTERVAL_MIN, SCAN_MODE_BALANCED_INTERVAL, SCAN_MODE_BALANCED_WINDOW,
    SCAN_MODE_LOW_LATENCY_INTERVAL, SCAN_MODE_LOW_LATENCY_WINDOW, SCAN_MODE_LOW_POWER_INTERVAL,
    SCAN_MODE_LOW_POWER_WINDOW,
};

/// Power / latency preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScanMode {
    LowPower = 0,
    Balanced = 1,
    LowLatency = 2,
}

impl ScanMode {
    /// `(interval, window)` in 0.625 ms units.
    pub const fn interval_window(self) -> (u16, u16) {
        match self {
            ScanMode::LowPower => (SCAN_MODE_LOW_POWER_INTERVAL, SCAN_MODE_LOW_POWER_WINDOW),
            ScanMode::Balanced => (SCAN_MODE_BALANCED_INTERVAL, SCAN_MODE_BALANCED_WINDOW),
            ScanMode::LowLatency => (SCAN_MODE_LOW_LATENCY_INTERVAL, SCAN_MODE_LOW_LATENCY_WINDOW),
        }
    }
}

impl From<u8> for ScanMode {
    fn from(raw: u8) -> Self {
        match raw {
            0 => ScanMode::LowPower,
            2 => ScanMode::LowLatency,
            // Unknown modes fall back to the middle of the table.
            _ => ScanMode::Balanced,
        }
    }
}

/// Passive scans only listen; active scans also request scan responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScanType {
    Passive = 0,
    Active = 1,
}

impl ScanType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ScanType::Passive),
            1 => Some(ScanType::Active),
            _ => None,
        }
    }
}

/// LE PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phy {
    Le1M = 1,
    Le2M = 2,
    LeCoded = 3,
}

impl Phy {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Phy::Le1M),
            2 => Some(Phy::Le2M),
            3 => Some(Phy::LeCoded),
            _ => None,
        }
    }
}

/// Set of PHYs the radio should scan on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhySet(u8);

impl PhySet {
    pub const LE_1M: PhySet = PhySet(0x01);
    pub const LE_2M: PhySet = PhySet(0x02);
    pub const LE_CODED: PhySet = PhySet(0x04);

    pub const fn union(self, other: PhySet) -> PhySet {
        PhySet(self.0 | other.0)
    }

    pub const fn contains(self, other: PhySet) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<Phy> for PhySet {
    fn from(phy: Phy) -> Self {
        match phy {
            Phy::Le1M => PhySet::LE_1M,
            Phy::Le2M => PhySet::LE_2M,
            Phy::LeCoded => PhySet::LE_CODED,
        }
    }
}

/// Controller-side advertiser filter policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FilterPolicy {
    #[default]
    AcceptAll = 0,
    Whitelist = 1,
    AcceptAllRpa = 2,
    WhitelistRpa = 3,
}

impl From<u8> for FilterPolicy {
    fn from(raw: u8) -> Self {
        match raw {
            1 => FilterPolicy::Whitelist,
            2 => FilterPolicy::AcceptAllRpa,
            3 => FilterPolicy::WhitelistRpa,
            _ => FilterPolicy::AcceptAll,
        }
    }
}

/// What a client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanSettings {
    pub mode: ScanMode,
    /// Legacy (non-extended) advertising PDUs only.
    pub legacy: bool,
    /// Defaults to passive.
    pub scan_type: Option<ScanType>,
    /// Defaults to LE 1M.
    pub phy: Option<Phy>,
    pub policy: FilterPolicy,
    /// Overrides the mode's interval when set.
    pub interval: Option<u16>,
    /// Overrides the mode's window when set.
    pub window: Option<u16>,
}

impl ScanSettings {
    pub const fn with_mode(mode: ScanMode) -> Self {
        Self {
            mode,
            legacy: true,
            scan_type: None,
            phy: None,
            policy: FilterPolicy::AcceptAll,
            interval: None,
            window: None,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::with_mode(ScanMode::LowPower)
    }
}

/// Scan settings in their byte-per-field wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct RawScanSettings {
    pub scan_mode: u8,
    pub legacy: u8,
    pub scan_type: u8,
    pub scan_phy: u8,
    pub policy: u8,
}

impl From<RawScanSettings> for ScanSettings {
    /// Unknown values fall back to the defaults: balanced mode, passive
    /// scanning, LE 1M, accept-all.
    fn from(raw: RawScanSettings) -> Self {
        Self {
            legacy: raw.legacy != 0,
            scan_type: ScanType::from_raw(raw.scan_type),
            phy: Phy::from_raw(raw.scan_phy),
            policy: FilterPolicy::from(raw.policy),
            ..Self::with_mode(ScanMode::from(raw.scan_mode))
        }
    }
}

/// Concrete radio scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    /// 0.625 ms units.
    pub interval: u16,
    /// 0.625 ms units, never above `interval`.
    pub window: u16,
    pub scan_type: ScanType,
    pub phys: PhySet,
    pub legacy: bool,
    pub policy: FilterPolicy,
}

/// Translate client settings into radio parameters.
pub fn translate(settings: &ScanSettings) -> ScanParams {
    let (mode_interval, mode_window) = settings.mode.interval_window();
    let interval = clamp_timing(settings.interval.unwrap_or(mode_interval));
    let window = clamp_timing(settings.window.unwrap_or(mode_window)).min(interval);

    ScanParams {
        interval,
        window,
        scan_type: settings.scan_type.unwrap_or(ScanType::Passive),
        phys: settings.phy.unwrap_or(Phy::Le1M).into(),
        legacy: settings.legacy,
        policy: settings.policy,
    }
}

fn clamp_timing(value: u16) -> u16 {
    value.clamp(SCAN_INTERVAL_MIN, SCAN_INTERVAL_MAX)
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
