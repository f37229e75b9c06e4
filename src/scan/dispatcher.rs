//! Result dispatcher: one radio report in, zero or more result callbacks out.

use super::filter;
use super::registry::{Registry, ScannerState};
use super::result::{AdvReport, ScanResult};

/// Deliver `report` to every active scanner whose filter admits it, in
/// registration order. Returns the number of callbacks made.
pub fn dispatch(registry: &mut Registry<'_>, report: &AdvReport<'_>, now_ms: u64) -> usize {
    let result = ScanResult::from_report(report);
    let mut delivered = 0;

    for scanner in registry.iter_mut() {
        if scanner.state != ScannerState::Active || scanner.is_expired(now_ms) {
            continue;
        }
        if !filter::evaluate(scanner.filter.as_ref(), &mut scanner.dedup, &result, now_ms) {
            continue;
        }
        scanner.callbacks.on_scan_result(scanner.handle, &result);
        delivered += 1;
    }

    if delivered > 0 {
        trace!("dispatch: {:?} -> {} scanner(s)", result.addr, delivered);
    }
    delivered
}
