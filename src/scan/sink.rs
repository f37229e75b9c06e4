//! Channel-backed callbacks.
//!
//! [`ChannelSink`] turns scanner callbacks into owned [`ScanEvent`]s on a
//! bounded `embassy_sync` channel so a separate task can consume them at its
//! own pace. The manager is never blocked: when the queue is nearly full,
//! results are dropped (and counted) while the last slots stay free for
//! start/stop events.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use super::result::{AddrType, AdvType, BdAddr, DeviceType, ScanResult};
use super::{ScanStatus, ScannerCallbacks, ScannerHandle};
use crate::config::{ADV_DATA_MAX_LEN, SCAN_EVENT_LIFECYCLE_RESERVE};

/// A [`ScanResult`] that owns its advertisement payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OwnedScanResult {
    pub addr: BdAddr,
    pub addr_type: AddrType,
    pub dev_type: DeviceType,
    pub adv_type: AdvType,
    pub rssi: i8,
    pub adv_data: Vec<u8, ADV_DATA_MAX_LEN>,
}

impl OwnedScanResult {
    /// Borrowed view, as a callback would have seen it.
    pub fn as_result(&self) -> ScanResult<'_> {
        ScanResult {
            addr: self.addr,
            addr_type: self.addr_type,
            dev_type: self.dev_type,
            adv_type: self.adv_type,
            rssi: self.rssi,
            adv_data: &self.adv_data,
        }
    }
}

impl From<&ScanResult<'_>> for OwnedScanResult {
    fn from(result: &ScanResult<'_>) -> Self {
        let len = result.adv_data.len().min(ADV_DATA_MAX_LEN);
        Self {
            addr: result.addr,
            addr_type: result.addr_type,
            dev_type: result.dev_type,
            adv_type: result.adv_type,
            rssi: result.rssi,
            adv_data: Vec::from_slice(&result.adv_data[..len]).unwrap_or_default(),
        }
    }
}

/// One callback, queued.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanEvent {
    StartStatus { scanner: ScannerHandle, status: ScanStatus },
    Result { scanner: ScannerHandle, result: OwnedScanResult },
    Stopped { scanner: ScannerHandle },
}

impl ScanEvent {
    pub fn scanner(&self) -> ScannerHandle {
        match self {
            ScanEvent::StartStatus { scanner, .. }
            | ScanEvent::Result { scanner, .. }
            | ScanEvent::Stopped { scanner } => *scanner,
        }
    }
}

pub struct ChannelSink<'a, M: RawMutex, const N: usize> {
    channel: &'a Channel<M, ScanEvent, N>,
    dropped: Cell<u32>,
}

impl<'a, M: RawMutex, const N: usize> ChannelSink<'a, M, N> {
    pub const fn new(channel: &'a Channel<M, ScanEvent, N>) -> Self {
        Self {
            channel,
            dropped: Cell::new(0),
        }
    }

    /// Events lost to a full queue since creation.
    pub fn dropped(&self) -> u32 {
        self.dropped.get()
    }

    fn push(&self, event: ScanEvent) {
        if self.channel.try_send(event).is_err() {
            self.note_drop();
        }
    }

    fn note_drop(&self) {
        let dropped = self.dropped.get().wrapping_add(1);
        self.dropped.set(dropped);
        if dropped.is_power_of_two() {
            warn!("sink: queue full, {} event(s) dropped", dropped);
        }
    }
}

impl<M: RawMutex, const N: usize> ScannerCallbacks for ChannelSink<'_, M, N> {
    fn on_scan_result(&self, scanner: ScannerHandle, result: &ScanResult<'_>) {
        if self.channel.free_capacity() <= SCAN_EVENT_LIFECYCLE_RESERVE {
            self.note_drop();
            return;
        }
        self.push(ScanEvent::Result {
            scanner,
            result: OwnedScanResult::from(result),
        });
    }

    fn on_scan_start_status(&self, scanner: ScannerHandle, status: ScanStatus) {
        self.push(ScanEvent::StartStatus { scanner, status });
    }

    fn on_scan_stopped(&self, scanner: ScannerHandle) {
        self.push(ScanEvent::Stopped { scanner });
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
