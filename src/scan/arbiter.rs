//! Radio scan arbiter.
//!
//! Owns the single physical scan. Every change to the live scanner set
//! recomputes the merged [`ScanParams`] from scratch; the radio is only
//! touched when that result differs from what is running or in flight.

use super::params::{FilterPolicy, ScanParams, ScanType};
use crate::error::RadioError;

/// Identifies one start request sent to the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestId(pub u32);

/// How the radio took a start command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioAck {
    /// The radio is scanning with the new parameters already.
    Accepted,
    /// The outcome arrives later through `ScanManager::on_radio_started`.
    Pending,
}

/// The controller driver.
pub trait Radio {
    /// Capability query: can this controller scan at all?
    fn is_scan_supported(&self) -> bool;

    /// (Re)start scanning with `params`, replacing any running scan.
    fn start_scan(&mut self, request: RequestId, params: &ScanParams) -> Result<RadioAck, RadioError>;

    fn stop_scan(&mut self) -> Result<(), RadioError>;
}

/// Merge the parameters of every live scanner.
///
/// Shortest interval and window, active if anyone is active, PHY union,
/// legacy only if everyone is legacy, filter policy only if everyone agrees.
pub fn merge<'p>(mut params: impl Iterator<Item = &'p ScanParams>) -> Option<ScanParams> {
    let first = *params.next()?;
    Some(params.fold(first, |acc, p| ScanParams {
        interval: acc.interval.min(p.interval),
        window: acc.window.min(p.window),
        scan_type: if acc.scan_type == ScanType::Active || p.scan_type == ScanType::Active {
            ScanType::Active
        } else {
            ScanType::Passive
        },
        phys: acc.phys.union(p.phys),
        legacy: acc.legacy && p.legacy,
        policy: if acc.policy == p.policy {
            acc.policy
        } else {
            FilterPolicy::AcceptAll
        },
    }))
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The running configuration already satisfies every live scanner.
    Unchanged,
    /// A request with exactly these parameters is in flight; join it.
    Joined(RequestId),
    /// A request with other parameters is in flight; retry after its ack.
    Busy,
    /// A new request was sent; the ack comes later.
    Submitted(RequestId),
    /// A new request was sent and answered on the spot.
    Completed(RequestId, Result<(), RadioError>),
    /// No live scanners; the radio was told to stop.
    Stopped,
    /// No live scanners, but the radio refused the stop. The old
    /// configuration stays current so the next reconcile retries.
    StopFailed(RadioError),
}

pub struct RadioArbiter<R> {
    radio: R,
    running: Option<ScanParams>,
    in_flight: Option<(RequestId, ScanParams)>,
    next_request: u32,
}

impl<R: Radio> RadioArbiter<R> {
    pub const fn new(radio: R) -> Self {
        Self {
            radio,
            running: None,
            in_flight: None,
            next_request: 1,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// The acknowledged configuration the radio is scanning with.
    pub fn running(&self) -> Option<&ScanParams> {
        self.running.as_ref()
    }

    /// Whether the radio is scanning or about to.
    pub fn is_scanning(&self) -> bool {
        self.running.is_some() || self.in_flight.is_some()
    }

    /// Bring the radio in line with `desired` (the merge of all live
    /// scanners, `None` when there are none).
    pub fn reconcile(&mut self, desired: Option<ScanParams>) -> Outcome {
        let Some(desired) = desired else {
            return self.stop();
        };

        if let Some((id, pending)) = self.in_flight {
            return if pending == desired {
                Outcome::Joined(id)
            } else {
                Outcome::Busy
            };
        }

        if self.running == Some(desired) {
            return Outcome::Unchanged;
        }

        let id = RequestId(self.next_request);
        self.next_request = self.next_request.wrapping_add(1);
        debug!(
            "radio: program interval={} window={} active={}",
            desired.interval,
            desired.window,
            desired.scan_type == ScanType::Active
        );

        match self.radio.start_scan(id, &desired) {
            Ok(RadioAck::Accepted) => {
                self.running = Some(desired);
                Outcome::Completed(id, Ok(()))
            }
            Ok(RadioAck::Pending) => {
                self.in_flight = Some((id, desired));
                Outcome::Submitted(id)
            }
            Err(e) => {
                warn!("radio: start rejected {:?}", e);
                Outcome::Completed(id, Err(e))
            }
        }
    }

    /// Radio answer for `id`. Returns `None` for stale or unknown ids.
    pub fn complete(&mut self, id: RequestId, result: Result<(), RadioError>) -> Option<Result<(), RadioError>> {
        match self.in_flight {
            Some((pending, params)) if pending == id => {
                self.in_flight = None;
                if result.is_ok() {
                    self.running = Some(params);
                }
                Some(result)
            }
            _ => {
                debug!("radio: ignoring stale ack {:?}", id);
                None
            }
        }
    }

    fn stop(&mut self) -> Outcome {
        if !self.is_scanning() {
            return Outcome::Unchanged;
        }
        info!("radio: stop scan");
        match self.radio.stop_scan() {
            Ok(()) => {
                self.running = None;
                self.in_flight = None;
                Outcome::Stopped
            }
            Err(e) => {
                warn!("radio: stop failed {:?}", e);
                Outcome::StopFailed(e)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
