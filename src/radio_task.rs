//! SoftDevice radio task.
//!
//! Executes [`RadioCommand`]s from the scan manager with the S140 Central
//! scanning API and feeds reports and start acknowledgements back as
//! [`RadioEvent`]s. A SoftDevice scan is a future: it runs while polled and
//! stops when dropped, so switching configuration means dropping the running
//! scan and starting a new one.

use core::pin::pin;

use defmt::{debug, info, trace, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::Timer;
use nrf_softdevice::ble::{central, PhySet as SdPhySet};
use nrf_softdevice::{raw, Softdevice};

use lescan::config::{RADIO_COMMAND_DEPTH, RADIO_EVENT_DEPTH, RADIO_START_GRACE_MS};
use lescan::scan::radio::{OwnedAdvReport, RadioCommand, RadioEvent};
use lescan::scan::{AddrType, AdvReport, AdvType, BdAddr, PhySet, RequestId, ScanParams, ScanType};
use lescan::RadioError;

pub type Commands = Receiver<'static, CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_DEPTH>;
pub type Events = Sender<'static, CriticalSectionRawMutex, RadioEvent, RADIO_EVENT_DEPTH>;

pub async fn run(sd: &'static Softdevice, commands: Commands, events: Events) -> ! {
    let mut next = commands.receive().await;
    loop {
        next = match next {
            RadioCommand::Stop => {
                debug!("radio: idle");
                commands.receive().await
            }
            RadioCommand::Start { request, params } => {
                scan_until_next_command(sd, request, &params, &commands, &events).await
            }
        };
    }
}

/// Run one scan configuration until the manager sends something new.
async fn scan_until_next_command(
    sd: &'static Softdevice,
    request: RequestId,
    params: &ScanParams,
    commands: &Commands,
    events: &Events,
) -> RadioCommand {
    let config = scan_config(params);
    info!(
        "radio: scanning interval={} window={} active={}",
        params.interval, params.window, config.active
    );

    let mut scan = pin!(central::scan(sd, &config, |adv| {
        let data = unsafe { core::slice::from_raw_parts(adv.data.p_data, adv.data.len as usize) };
        let report = AdvReport {
            addr: BdAddr(adv.peer_addr.addr),
            addr_type: AddrType::from(adv.peer_addr.addr_type()),
            adv_type: adv_type(&adv.type_),
            rssi: adv.rssi,
            data,
        };
        if events.try_send(RadioEvent::Report(OwnedAdvReport::from_report(&report))).is_err() {
            trace!("radio: event queue full, report dropped");
        }
        None::<()>
    }));

    // The SoftDevice refuses bad parameters straight away; a scan still
    // running after the grace period has been accepted.
    match select(scan.as_mut(), Timer::after_millis(RADIO_START_GRACE_MS)).await {
        Either::First(result) => {
            let err = match result {
                Err(e) => scan_error(e),
                Ok(()) => RadioError::Rejected(0),
            };
            warn!("radio: scan start failed {:?}", err);
            events
                .send(RadioEvent::Started {
                    request,
                    result: Err(err),
                })
                .await;
            return commands.receive().await;
        }
        Either::Second(()) => {
            events.send(RadioEvent::Started { request, result: Ok(()) }).await;
        }
    }

    match select(scan, commands.receive()).await {
        Either::First(result) => {
            warn!("radio: scan ended on its own ({:?})", result.is_ok());
            commands.receive().await
        }
        // Dropping the scan future stops the SoftDevice scan.
        Either::Second(cmd) => cmd,
    }
}

fn scan_config(params: &ScanParams) -> central::ScanConfig<'static> {
    central::ScanConfig {
        active: params.scan_type == ScanType::Active,
        extended: !params.legacy,
        phys: sd_phys(params.phys),
        interval: u32::from(params.interval),
        window: u32::from(params.window),
        ..Default::default()
    }
}

/// Scanning runs on 1M and/or Coded; 2M is only reachable through
/// extended advertising pointers, which the SoftDevice follows itself.
fn sd_phys(phys: PhySet) -> SdPhySet {
    match (phys.contains(PhySet::LE_1M), phys.contains(PhySet::LE_CODED)) {
        (true, true) => SdPhySet::M1Coded,
        (false, true) => SdPhySet::Coded,
        _ => SdPhySet::M1,
    }
}

fn adv_type(t: &raw::ble_gap_adv_report_type_t) -> AdvType {
    if t.scan_response() != 0 {
        AdvType::ScanRsp
    } else if t.directed() != 0 {
        AdvType::DirectInd
    } else if t.connectable() != 0 {
        AdvType::AdvInd
    } else if t.scannable() != 0 {
        AdvType::ScanInd
    } else {
        AdvType::NonconnInd
    }
}

fn scan_error(e: central::ScanError) -> RadioError {
    match e {
        central::ScanError::Timeout => RadioError::Busy,
        central::ScanError::Raw(code) => RadioError::Rejected(code as u32 as u8),
    }
}
