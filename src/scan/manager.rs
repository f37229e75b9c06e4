//! Scan manager: the public operation surface.
//!
//! All state changes go through `&mut self`, so the owner (one control
//! task in the firmware) serializes starts, stops, radio acknowledgements
//! and report delivery. Callbacks are invoked inline and get no access to
//! the manager.

use heapless::Vec;

use super::arbiter::{Outcome, Radio, RadioArbiter, RequestId};
use super::dispatcher;
use super::filter::{CompiledFilter, DuplicateCache, ScanFilter};
use super::params::{translate, ScanParams, ScanSettings, ScanType};
use super::registry::{Registry, Scanner, ScannerState};
use super::result::AdvReport;
use super::{BtInstance, Clock, ScanStatus, ScannerCallbacks, ScannerHandle};
use crate::config::MAX_SCANNERS;
use crate::error::{RadioError, ScanError};

pub struct ScanManager<'a, R, C> {
    registry: Registry<'a>,
    arbiter: RadioArbiter<R>,
    clock: C,
}

impl<'a, R: Radio, C: Clock> ScanManager<'a, R, C> {
    pub const fn new(radio: R, clock: C) -> Self {
        Self {
            registry: Registry::new(),
            arbiter: RadioArbiter::new(radio),
            clock,
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Client operations
    // ───────────────────────────────────────────────────────────────────

    /// Start a scan with default settings.
    pub fn start_scan(
        &mut self,
        ins: &impl BtInstance,
        callbacks: &'a dyn ScannerCallbacks,
    ) -> Result<ScannerHandle, ScanError> {
        self.start(ins, None, None, callbacks)
    }

    pub fn start_scan_with_settings(
        &mut self,
        ins: &impl BtInstance,
        settings: &ScanSettings,
        callbacks: &'a dyn ScannerCallbacks,
    ) -> Result<ScannerHandle, ScanError> {
        self.start(ins, Some(settings), None, callbacks)
    }

    /// Start a filtered scan. A filter with too many UUIDs is refused here,
    /// before the radio is touched.
    pub fn start_scan_with_filter(
        &mut self,
        ins: &impl BtInstance,
        settings: &ScanSettings,
        filter: &ScanFilter<'_>,
        callbacks: &'a dyn ScannerCallbacks,
    ) -> Result<ScannerHandle, ScanError> {
        self.start(ins, Some(settings), Some(filter), callbacks)
    }

    /// Stop a scanner. `on_scan_stopped` has fired by the time this returns.
    pub fn stop_scan(&mut self, ins: &impl BtInstance, handle: ScannerHandle) -> Result<(), ScanError> {
        let owner = ins.id();
        match self.stop_matching(|s| s.handle == handle && s.owner == owner) {
            0 => {
                debug!("stop: scanner {:?} not found", handle);
                Err(ScanError::ScannerNotFound)
            }
            _ => Ok(()),
        }
    }

    pub fn is_scan_supported(&self, ins: &impl BtInstance) -> bool {
        ins.is_le_enabled() && self.arbiter.radio().is_scan_supported()
    }

    /// Stop every scanner owned by `ins` (client went away).
    pub fn remove_instance(&mut self, ins: &impl BtInstance) -> usize {
        let owner = ins.id();
        self.stop_matching(|s| s.owner == owner)
    }

    /// Stop every scanner (adapter turning off).
    pub fn shutdown(&mut self) -> usize {
        self.stop_matching(|_| true)
    }

    // ───────────────────────────────────────────────────────────────────
    // Radio side
    // ───────────────────────────────────────────────────────────────────

    /// The radio answered start request `request`.
    pub fn on_radio_started(&mut self, request: RequestId, result: Result<(), RadioError>) {
        let Some(result) = self.arbiter.complete(request, result) else {
            return;
        };
        let affected = self.resolve(request, result);
        // A refused reprogram nobody was waiting on keeps the old scan,
        // unless scanners held back behind it still need a request.
        if result.is_ok() || affected > 0 || self.has_unsubmitted() {
            self.reconcile();
        }
    }

    /// Feed one advertisement report through the filters. Returns the
    /// number of result callbacks made.
    pub fn dispatch_report(&mut self, report: &AdvReport<'_>) -> usize {
        // Reports with nobody left to receive them: an earlier stop was
        // refused by the radio.
        if self.registry.is_empty() && self.arbiter.is_scanning() {
            self.reconcile();
        }
        let now = self.clock.now_ms();
        dispatcher::dispatch(&mut self.registry, report, now)
    }

    // ───────────────────────────────────────────────────────────────────
    // Housekeeping
    // ───────────────────────────────────────────────────────────────────

    /// Stop scanners whose filter duration has run out.
    pub fn expire_scanners(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.stop_matching(|s| s.state == ScannerState::Active && s.is_expired(now))
    }

    /// Earliest auto-stop deadline among active scanners.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.registry.iter().filter_map(|s| s.deadline_ms).min()
    }

    /// Configuration the radio is currently scanning with.
    pub fn effective_params(&self) -> Option<ScanParams> {
        self.arbiter.running().copied()
    }

    pub fn scanner_state(&self, handle: ScannerHandle) -> Option<ScannerState> {
        self.registry.get(handle).map(|s| s.state)
    }

    pub fn scanner_count(&self) -> usize {
        self.registry.len()
    }

    pub fn radio(&self) -> &R {
        self.arbiter.radio()
    }

    pub fn radio_mut(&mut self) -> &mut R {
        self.arbiter.radio_mut()
    }

    // ───────────────────────────────────────────────────────────────────
    // Internals
    // ───────────────────────────────────────────────────────────────────

    fn start(
        &mut self,
        ins: &impl BtInstance,
        settings: Option<&ScanSettings>,
        filter: Option<&ScanFilter<'_>>,
        callbacks: &'a dyn ScannerCallbacks,
    ) -> Result<ScannerHandle, ScanError> {
        let handle = self.registry.allocate_handle();
        match self.register(handle, ins, settings, filter, callbacks) {
            Ok(()) => {
                info!("scanner {:?} registered", handle);
                self.reconcile();
                Ok(handle)
            }
            Err(e) => {
                warn!("scanner {:?} refused: {:?}", handle, e);
                callbacks.on_scan_start_status(handle, e.into());
                Err(e)
            }
        }
    }

    fn register(
        &mut self,
        handle: ScannerHandle,
        ins: &impl BtInstance,
        settings: Option<&ScanSettings>,
        filter: Option<&ScanFilter<'_>>,
        callbacks: &'a dyn ScannerCallbacks,
    ) -> Result<(), ScanError> {
        if !ins.has_scan_permission() {
            return Err(ScanError::NoPermission);
        }
        let filter = filter.map(CompiledFilter::compile).transpose()?;
        let settings = settings.copied().unwrap_or_default();
        let owner = ins.id();

        if let Some(identity) = callbacks.identity() {
            if self
                .registry
                .find_duplicate(owner, identity, &settings, filter.as_ref())
                .is_some()
            {
                return Err(ScanError::ScannerExisted);
            }
        }

        let mut params = translate(&settings);
        // Scan responses only exist under active scanning.
        if filter.as_ref().is_some_and(|f| f.active) {
            params.scan_type = ScanType::Active;
        }

        self.registry.insert(Scanner {
            handle,
            owner,
            state: ScannerState::Requested,
            settings,
            params,
            filter,
            dedup: DuplicateCache::new(),
            callbacks,
            request: None,
            deadline_ms: None,
        })
    }

    /// Recompute the merged configuration and drive the radio towards it.
    fn reconcile(&mut self) {
        loop {
            let desired = self.registry.merged_params();
            match self.arbiter.reconcile(desired) {
                Outcome::Unchanged => {
                    self.activate_waiting();
                    return;
                }
                Outcome::Joined(id) | Outcome::Submitted(id) => {
                    self.attach_waiting(id);
                    return;
                }
                Outcome::Busy | Outcome::Stopped | Outcome::StopFailed(_) => return,
                Outcome::Completed(id, result) => {
                    self.attach_waiting(id);
                    let affected = self.resolve(id, result);
                    if result.is_err() && affected == 0 {
                        return;
                    }
                    // Failed scanners are gone; the rest may need a new merge.
                }
            }
        }
    }

    /// The running configuration covers everyone: activate all waiters.
    fn activate_waiting(&mut self) {
        let now = self.clock.now_ms();
        for s in self.registry.iter_mut() {
            if s.state == ScannerState::Requested {
                s.activate(now);
                s.callbacks.on_scan_start_status(s.handle, ScanStatus::Success);
            }
        }
    }

    /// Scanners held back while another request was in flight.
    fn has_unsubmitted(&self) -> bool {
        self.registry
            .iter()
            .any(|s| s.state == ScannerState::Requested && s.request.is_none())
    }

    fn attach_waiting(&mut self, id: RequestId) {
        for s in self.registry.iter_mut() {
            if s.state == ScannerState::Requested && s.request.is_none() {
                s.request = Some(id);
            }
        }
    }

    /// Settle every scanner waiting on `id`. Returns how many there were.
    fn resolve(&mut self, id: RequestId, result: Result<(), RadioError>) -> usize {
        let now = self.clock.now_ms();
        let mut affected = 0;
        self.registry.retain_mut(|s| {
            if s.state != ScannerState::Requested || s.request != Some(id) {
                return true;
            }
            affected += 1;
            match result {
                Ok(()) => {
                    s.activate(now);
                    s.callbacks.on_scan_start_status(s.handle, ScanStatus::Success);
                    true
                }
                Err(_) => {
                    s.state = ScannerState::Stopped;
                    s.callbacks.on_scan_start_status(s.handle, ScanStatus::StartFail);
                    false
                }
            }
        });
        if let Err(e) = result {
            warn!("radio request {:?} failed ({:?}), {} scanner(s) dropped", id, e, affected);
        }
        affected
    }

    /// Take every scanner matching `pred` out of service: exclude it from
    /// dispatch, re-merge the radio, then notify. Returns how many stopped.
    fn stop_matching(&mut self, mut pred: impl FnMut(&Scanner<'a>) -> bool) -> usize {
        let mut stopped: Vec<(ScannerHandle, &'a dyn ScannerCallbacks, bool), MAX_SCANNERS> = Vec::new();
        self.registry.retain_mut(|s| {
            if !pred(s) {
                return true;
            }
            let pending = s.state == ScannerState::Requested;
            s.state = ScannerState::Stopping;
            let _ = stopped.push((s.handle, s.callbacks, pending));
            false
        });
        if stopped.is_empty() {
            return 0;
        }

        self.reconcile();

        for &(handle, callbacks, pending) in stopped.iter() {
            if pending {
                callbacks.on_scan_start_status(handle, ScanStatus::ScannerRemoved);
            }
            callbacks.on_scan_stopped(handle);
            info!("scanner {:?} stopped", handle);
        }
        stopped.len()
    }
}
