//! Error types for the scan manager.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (feature `defmt`) for on-target logging.

use crate::scan::ScanStatus;

/// Why a scan operation did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanError {
    /// The calling instance may not scan.
    NoPermission,

    /// The filter carries more service UUIDs than the manager supports.
    InvalidFilter,

    /// An identical registration (same instance, callback identity,
    /// settings and filter) is already live.
    ScannerExisted,

    /// Every registry slot is taken.
    RegistryFull,

    /// The handle is unknown, already stopped, or owned by another instance.
    ScannerNotFound,
}

/// Errors reported by the radio / controller driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Controller rejected the command; raw HCI / SoftDevice status.
    Rejected(u8),
    /// Command queue to the radio task is full.
    Busy,
    /// The controller has no LE scanning support.
    Unsupported,
}

// Convenience conversions

impl From<ScanError> for ScanStatus {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::NoPermission => ScanStatus::NoPermission,
            ScanError::InvalidFilter => ScanStatus::StartFail,
            ScanError::ScannerExisted => ScanStatus::ScannerExisted,
            ScanError::RegistryFull => ScanStatus::ScannerRegNomem,
            ScanError::ScannerNotFound => ScanStatus::ScannerNotFound,
        }
    }
}
