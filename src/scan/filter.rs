//! Per-scanner report filtering and duplicate suppression.

use heapless::Vec;

use super::adv_parser::advertises_any_uuid;
use super::result::{BdAddr, ScanResult};
use crate::config::{BLE_SCAN_FILTER_UUID_MAX_NUM, DUPLICATE_CACHE_SIZE};
use crate::error::ScanError;

/// Filter as supplied by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanFilter<'a> {
    /// Stop the scanner this long after it becomes active (0 = no limit).
    pub duration_ms: u32,
    /// Duplicate-suppression window (0 = for the scanner's lifetime).
    pub period_ms: u32,
    /// Service UUIDs to match; zero entries are ignored.
    pub uuids: &'a [u16],
    /// Only deliver scan responses.
    pub active: bool,
    /// Deliver every report, including repeats from the same address.
    pub duplicated: bool,
}

/// Validated, owned form of a [`ScanFilter`] kept by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompiledFilter {
    pub duration_ms: u32,
    pub period_ms: u32,
    pub uuids: Vec<u16, BLE_SCAN_FILTER_UUID_MAX_NUM>,
    pub active: bool,
    pub duplicated: bool,
}

impl CompiledFilter {
    pub fn compile(filter: &ScanFilter<'_>) -> Result<Self, ScanError> {
        if filter.uuids.len() > BLE_SCAN_FILTER_UUID_MAX_NUM {
            return Err(ScanError::InvalidFilter);
        }
        let mut uuids = Vec::new();
        for &uuid in filter.uuids.iter().filter(|&&u| u != 0) {
            uuids.push(uuid).map_err(|_| ScanError::InvalidFilter)?;
        }
        Ok(Self {
            duration_ms: filter.duration_ms,
            period_ms: filter.period_ms,
            uuids,
            active: filter.active,
            duplicated: filter.duplicated,
        })
    }

    /// UUID and active-scan criteria; duplicates are not considered here.
    pub fn matches(&self, result: &ScanResult<'_>) -> bool {
        if !self.uuids.is_empty() && !advertises_any_uuid(result.adv_data, &self.uuids) {
            return false;
        }
        if self.active && !result.is_scan_response() {
            return false;
        }
        true
    }
}

/// Sliding-window record of addresses already delivered to one scanner.
///
/// Entries are ordered by last delivery, oldest first.
#[derive(Debug, Default)]
pub struct DuplicateCache {
    seen: Vec<(BdAddr, u64), DUPLICATE_CACHE_SIZE>,
}

impl DuplicateCache {
    pub const fn new() -> Self {
        Self { seen: Vec::new() }
    }

    /// Returns `true` if `addr` may be delivered at `now_ms`, recording the
    /// delivery. `period_ms == 0` never expires an entry.
    pub fn admit(&mut self, addr: BdAddr, now_ms: u64, period_ms: u32) -> bool {
        let period = u64::from(period_ms);
        let expired = |at: u64| period != 0 && now_ms.saturating_sub(at) >= period;

        if let Some(pos) = self.seen.iter().position(|(a, _)| *a == addr) {
            if !expired(self.seen[pos].1) {
                return false;
            }
            self.seen.remove(pos);
        }

        self.seen.retain(|&(_, at)| !expired(at));
        if self.seen.is_full() {
            self.seen.remove(0);
        }
        let _ = self.seen.push((addr, now_ms));
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Full filter-engine decision for one (scanner, result) pair.
pub fn evaluate(
    filter: Option<&CompiledFilter>,
    cache: &mut DuplicateCache,
    result: &ScanResult<'_>,
    now_ms: u64,
) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    if !filter.matches(result) {
        return false;
    }
    filter.duplicated || cache.admit(result.addr, now_ms, filter.period_ms)
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::result::{AddrType, AdvType, DeviceType};

    const HRS_ONLY: [u8; 4] = [0x03, 0x03, 0x0D, 0x18];
    const HID_ONLY: [u8; 4] = [0x03, 0x03, 0x12, 0x18];
    const HRS_AND_HID: [u8; 6] = [0x05, 0x03, 0x0D, 0x18, 0x12, 0x18];

    fn result(addr: u8, adv_type: AdvType, data: &[u8]) -> ScanResult<'_> {
        ScanResult {
            addr: BdAddr([addr, 0, 0, 0, 0, 0]),
            addr_type: AddrType::Public,
            dev_type: DeviceType::Ble,
            adv_type,
            rssi: -50,
            adv_data: data,
        }
    }

    fn compiled(uuids: &[u16], active: bool, duplicated: bool, period_ms: u32) -> CompiledFilter {
        CompiledFilter::compile(&ScanFilter {
            uuids,
            active,
            duplicated,
            period_ms,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn too_many_uuids_rejected() {
        let filter = ScanFilter {
            uuids: &[0x180D, 0x180F, 0x1812],
            ..Default::default()
        };
        assert_eq!(CompiledFilter::compile(&filter), Err(ScanError::InvalidFilter));
    }

    #[test]
    fn zero_uuids_are_ignored() {
        let filter = compiled(&[0x0000, 0x0000], false, true, 0);
        assert!(filter.uuids.is_empty());
        assert!(filter.matches(&result(1, AdvType::AdvInd, &HID_ONLY)));
    }

    #[test]
    fn uuid_intersection() {
        let filter = compiled(&[0x180D], false, true, 0);
        assert!(!filter.matches(&result(1, AdvType::AdvInd, &HID_ONLY)));
        assert!(filter.matches(&result(1, AdvType::AdvInd, &HRS_AND_HID)));
        assert!(filter.matches(&result(1, AdvType::AdvInd, &HRS_ONLY)));
    }

    #[test]
    fn uuid_filter_drops_empty_and_malformed_payloads() {
        let filter = compiled(&[0x180D], false, true, 0);
        assert!(!filter.matches(&result(1, AdvType::AdvInd, &[])));
        assert!(!filter.matches(&result(1, AdvType::AdvInd, &[0x05, 0x03, 0x0D])));
    }

    #[test]
    fn active_filter_requires_scan_response() {
        let filter = compiled(&[], true, true, 0);
        assert!(!filter.matches(&result(1, AdvType::AdvInd, &[])));
        assert!(filter.matches(&result(1, AdvType::ScanRsp, &[])));
    }

    #[test]
    fn no_filter_delivers_everything() {
        let mut cache = DuplicateCache::new();
        let r = result(1, AdvType::NonconnInd, &[]);
        assert!(evaluate(None, &mut cache, &r, 0));
        assert!(evaluate(None, &mut cache, &r, 0));
        assert!(cache.is_empty());
    }

    #[test]
    fn duplicates_delivered_when_allowed() {
        let filter = compiled(&[], false, true, 1_000);
        let mut cache = DuplicateCache::new();
        let r = result(1, AdvType::AdvInd, &[]);
        for t in 0..5 {
            assert!(evaluate(Some(&filter), &mut cache, &r, t));
        }
    }

    #[test]
    fn duplicates_suppressed_within_period() {
        let filter = compiled(&[], false, false, 1_000);
        let mut cache = DuplicateCache::new();
        let r = result(1, AdvType::AdvInd, &[]);
        assert!(evaluate(Some(&filter), &mut cache, &r, 100));
        assert!(!evaluate(Some(&filter), &mut cache, &r, 500));
        assert!(!evaluate(Some(&filter), &mut cache, &r, 1_099));
        assert!(evaluate(Some(&filter), &mut cache, &r, 1_100));
        assert!(!evaluate(Some(&filter), &mut cache, &r, 1_200));
    }

    #[test]
    fn suppression_is_per_address() {
        let filter = compiled(&[], false, false, 1_000);
        let mut cache = DuplicateCache::new();
        assert!(evaluate(Some(&filter), &mut cache, &result(1, AdvType::AdvInd, &[]), 0));
        assert!(evaluate(Some(&filter), &mut cache, &result(2, AdvType::AdvInd, &[]), 0));
        assert!(!evaluate(Some(&filter), &mut cache, &result(1, AdvType::AdvInd, &[]), 10));
    }

    #[test]
    fn zero_period_suppresses_for_lifetime() {
        let mut cache = DuplicateCache::new();
        let addr = BdAddr([9; 6]);
        assert!(cache.admit(addr, 0, 0));
        assert!(!cache.admit(addr, 1_000_000, 0));
    }

    #[test]
    fn rejected_reports_are_not_recorded() {
        let filter = compiled(&[0x180D], false, false, 1_000);
        let mut cache = DuplicateCache::new();
        assert!(!evaluate(Some(&filter), &mut cache, &result(1, AdvType::AdvInd, &HID_ONLY), 0));
        assert!(cache.is_empty());
        assert!(evaluate(Some(&filter), &mut cache, &result(1, AdvType::AdvInd, &HRS_ONLY), 1));
    }

    #[test]
    fn full_cache_evicts_least_recent() {
        let mut cache = DuplicateCache::new();
        for i in 0..DUPLICATE_CACHE_SIZE as u8 {
            assert!(cache.admit(BdAddr([i; 6]), u64::from(i), 0));
        }
        assert_eq!(cache.len(), DUPLICATE_CACHE_SIZE);

        // One more address pushes out address 0.
        assert!(cache.admit(BdAddr([0xEE; 6]), 100, 0));
        assert_eq!(cache.len(), DUPLICATE_CACHE_SIZE);
        assert!(cache.admit(BdAddr([0; 6]), 101, 0));
        assert!(!cache.admit(BdAddr([2; 6]), 102, 0));
    }

    #[test]
    fn expired_entries_are_pruned() {
        let mut cache = DuplicateCache::new();
        assert!(cache.admit(BdAddr([1; 6]), 0, 100));
        assert!(cache.admit(BdAddr([2; 6]), 50, 100));
        assert!(cache.admit(BdAddr([3; 6]), 120, 100));
        // Address 1 expired at 100 and was pruned on the last insert.
        assert_eq!(cache.len(), 2);
    }
}
