//! Message types between the manager and a radio task.
//!
//! The radio driver runs in its own task. [`ChannelRadio`] is the manager's
//! side of that split: every start becomes a queued [`RadioCommand`] and is
//! answered later by a [`RadioEvent::Started`] fed back through
//! `ScanManager::on_radio_started`.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;
use heapless::Vec;

use super::arbiter::{Radio, RadioAck, RequestId};
use super::params::ScanParams;
use super::result::{AddrType, AdvReport, AdvType, BdAddr};
use crate::config::ADV_DATA_MAX_LEN;
use crate::error::RadioError;

/// Manager → radio task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioCommand {
    /// (Re)start scanning with `params`, replacing any running scan.
    Start { request: RequestId, params: ScanParams },
    Stop,
}

/// Radio task → manager.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    Started {
        request: RequestId,
        result: Result<(), RadioError>,
    },
    Report(OwnedAdvReport),
}

/// An [`AdvReport`] that owns its payload, for crossing a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OwnedAdvReport {
    pub addr: BdAddr,
    pub addr_type: AddrType,
    pub adv_type: AdvType,
    pub rssi: i8,
    pub data: Vec<u8, ADV_DATA_MAX_LEN>,
}

impl OwnedAdvReport {
    /// Copy a report. Payloads longer than `ADV_DATA_MAX_LEN` are cut.
    pub fn from_report(report: &AdvReport<'_>) -> Self {
        let len = report.data.len().min(ADV_DATA_MAX_LEN);
        Self {
            addr: report.addr,
            addr_type: report.addr_type,
            adv_type: report.adv_type,
            rssi: report.rssi,
            data: Vec::from_slice(&report.data[..len]).unwrap_or_default(),
        }
    }

    pub fn as_report(&self) -> AdvReport<'_> {
        AdvReport {
            addr: self.addr,
            addr_type: self.addr_type,
            adv_type: self.adv_type,
            rssi: self.rssi,
            data: &self.data,
        }
    }
}

/// [`Radio`] that forwards commands to a radio task over a channel.
pub struct ChannelRadio<'a, M: RawMutex, const N: usize> {
    commands: Sender<'a, M, RadioCommand, N>,
    supported: bool,
}

impl<'a, M: RawMutex, const N: usize> ChannelRadio<'a, M, N> {
    /// `supported` is the controller's LE scan capability, read once at
    /// bring-up.
    pub const fn new(commands: Sender<'a, M, RadioCommand, N>, supported: bool) -> Self {
        Self { commands, supported }
    }
}

impl<M: RawMutex, const N: usize> Radio for ChannelRadio<'_, M, N> {
    fn is_scan_supported(&self) -> bool {
        self.supported
    }

    fn start_scan(&mut self, request: RequestId, params: &ScanParams) -> Result<RadioAck, RadioError> {
        if !self.supported {
            return Err(RadioError::Unsupported);
        }
        self.commands
            .try_send(RadioCommand::Start {
                request,
                params: *params,
            })
            .map_err(|_| RadioError::Busy)?;
        Ok(RadioAck::Pending)
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.commands.try_send(RadioCommand::Stop).map_err(|_| RadioError::Busy)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
