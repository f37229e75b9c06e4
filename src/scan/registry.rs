//! Scanner registry.
//!
//! Owns every logical scanner in registration order. Handles come from a
//! monotonic counter and are never handed out twice, so a late radio report
//! can never reach a scanner that replaced a stopped one.

use heapless::Vec;

use super::arbiter::{merge, RequestId};
use super::filter::{CompiledFilter, DuplicateCache};
use super::params::{ScanParams, ScanSettings};
use super::{InstanceId, ScannerCallbacks, ScannerHandle};
use crate::config::MAX_SCANNERS;
use crate::error::ScanError;

/// Lifecycle of one scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScannerState {
    /// Waiting for the radio to run a configuration that covers it.
    Requested,
    /// Receiving results.
    Active,
    /// Stop in progress; excluded from dispatch and from the merge.
    Stopping,
    /// Gone. Never observable through the registry.
    Stopped,
}

impl ScannerState {
    /// Counts towards the merged radio configuration.
    pub fn is_live(self) -> bool {
        matches!(self, ScannerState::Requested | ScannerState::Active)
    }
}

pub struct Scanner<'a> {
    pub handle: ScannerHandle,
    pub owner: InstanceId,
    pub state: ScannerState,
    pub settings: ScanSettings,
    pub params: ScanParams,
    pub filter: Option<CompiledFilter>,
    pub dedup: DuplicateCache,
    pub callbacks: &'a dyn ScannerCallbacks,
    /// Radio request this scanner is waiting on, once submitted.
    pub request: Option<RequestId>,
    /// Auto-stop time, set on activation when the filter has a duration.
    pub deadline_ms: Option<u64>,
}

impl<'a> Scanner<'a> {
    /// Move to `Active` at `now_ms`, arming the filter duration.
    pub fn activate(&mut self, now_ms: u64) {
        self.state = ScannerState::Active;
        self.request = None;
        self.deadline_ms = self
            .filter
            .as_ref()
            .filter(|f| f.duration_ms > 0)
            .map(|f| now_ms.saturating_add(u64::from(f.duration_ms)));
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline_ms.is_some_and(|d| now_ms >= d)
    }
}

pub struct Registry<'a> {
    scanners: Vec<Scanner<'a>, MAX_SCANNERS>,
    last_id: u32,
}

impl<'a> Registry<'a> {
    pub const fn new() -> Self {
        Self {
            scanners: Vec::new(),
            last_id: 0,
        }
    }

    /// Reserve the next handle. Skips 0 and, after wrap-around, any handle
    /// still registered.
    pub fn allocate_handle(&mut self) -> ScannerHandle {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != 0 && self.get(ScannerHandle::new(self.last_id)).is_none() {
                return ScannerHandle::new(self.last_id);
            }
        }
    }

    pub fn insert(&mut self, scanner: Scanner<'a>) -> Result<(), ScanError> {
        self.scanners.push(scanner).map_err(|_| ScanError::RegistryFull)
    }

    /// A live scanner registered by `owner` with callbacks of the same
    /// identity, equal settings and an equal filter.
    pub fn find_duplicate(
        &self,
        owner: InstanceId,
        identity: u32,
        settings: &ScanSettings,
        filter: Option<&CompiledFilter>,
    ) -> Option<ScannerHandle> {
        self.scanners
            .iter()
            .find(|s| {
                s.state.is_live()
                    && s.owner == owner
                    && s.callbacks.identity() == Some(identity)
                    && s.settings == *settings
                    && s.filter.as_ref() == filter
            })
            .map(|s| s.handle)
    }

    pub fn get(&self, handle: ScannerHandle) -> Option<&Scanner<'a>> {
        self.scanners.iter().find(|s| s.handle == handle)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Scanner<'a>> {
        self.scanners.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, Scanner<'a>> {
        self.scanners.iter_mut()
    }

    /// Keep scanners for which `f` returns `true`.
    pub fn retain_mut(&mut self, f: impl FnMut(&mut Scanner<'a>) -> bool) {
        self.scanners.retain_mut(f);
    }

    /// Merged parameters of every scanner that counts towards the radio.
    pub fn merged_params(&self) -> Option<ScanParams> {
        merge(self.scanners.iter().filter(|s| s.state.is_live()).map(|s| &s.params))
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }
}

impl Default for Registry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
