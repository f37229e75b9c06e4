//! lescan firmware - BLE scan manager on nRF52840 + S140.
//!
//! Three tasks besides the SoftDevice event loop:
//!
//! - `radio_task` owns the SoftDevice scan and executes radio commands.
//! - `main` owns the [`ScanManager`]: it registers the demo scanners, then
//!   feeds radio events into the manager and runs duration expiry.
//! - `scan_event_task` drains the scanner callbacks queued by the
//!   [`ChannelSink`] and logs them over RTT.

#![no_std]
#![no_main]

mod radio_task;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use lescan::config::{
    DEMO_ACTIVE_SCAN_DURATION_MS, DEMO_FILTER_PERIOD_MS, DEMO_FILTER_UUID, RADIO_COMMAND_DEPTH, RADIO_EVENT_DEPTH,
    SCAN_EVENT_QUEUE_DEPTH,
};
use lescan::scan::radio::{ChannelRadio, RadioCommand, RadioEvent};
use lescan::scan::sink::{ChannelSink, ScanEvent};
use lescan::scan::RawScanSettings;
use lescan::{BtInstance, Clock, InstanceId, ScanFilter, ScanManager, ScanMode, ScanSettings};

// ═══════════════════════════════════════════════════════════════════════════
// Channels
// ═══════════════════════════════════════════════════════════════════════════

static RADIO_COMMANDS: Channel<CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_DEPTH> = Channel::new();
static RADIO_EVENTS: Channel<CriticalSectionRawMutex, RadioEvent, RADIO_EVENT_DEPTH> = Channel::new();
static SCAN_EVENTS: Channel<CriticalSectionRawMutex, ScanEvent, SCAN_EVENT_QUEUE_DEPTH> = Channel::new();

/// Heart-rate scanner settings in wire form: balanced, legacy, passive,
/// LE 1M, accept-all.
const HRS_SETTINGS: RawScanSettings = RawScanSettings {
    scan_mode: 1,
    legacy: 1,
    scan_type: 0,
    scan_phy: 1,
    policy: 0,
};

static SINK: StaticCell<ChannelSink<'static, CriticalSectionRawMutex, SCAN_EVENT_QUEUE_DEPTH>> = StaticCell::new();

struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// The firmware itself is the only client.
struct LocalApp;

impl BtInstance for LocalApp {
    fn id(&self) -> InstanceId {
        InstanceId(0)
    }

    fn has_scan_permission(&self) -> bool {
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn radio_task(sd: &'static Softdevice) -> ! {
    radio_task::run(sd, RADIO_COMMANDS.receiver(), RADIO_EVENTS.sender()).await
}

#[embassy_executor::task]
async fn scan_event_task() -> ! {
    loop {
        match SCAN_EVENTS.receive().await {
            ScanEvent::StartStatus { scanner, status } => {
                info!("scanner {}: start {:?}", scanner.id(), status);
            }
            ScanEvent::Result { scanner, result } => {
                let r = result.as_result();
                info!(
                    "scanner {}: {:02x} rssi={} name={:?}",
                    scanner.id(),
                    r.addr.0,
                    r.rssi,
                    r.local_name()
                );
            }
            ScanEvent::Stopped { scanner } => info!("scanner {}: stopped", scanner.id()),
        }
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("lescan starting");

    // SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(nrf_config);

    let sd = Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(radio_task(sd)));
    unwrap!(spawner.spawn(scan_event_task()));

    let sink = SINK.init(ChannelSink::new(&SCAN_EVENTS));
    let app = LocalApp;
    let mut manager = ScanManager::new(ChannelRadio::new(RADIO_COMMANDS.sender(), true), SystemClock);

    if !manager.is_scan_supported(&app) {
        warn!("LE scanning not supported, nothing to do");
        return;
    }

    // Everything in range, at low duty cycle.
    if let Err(e) = manager.start_scan(&app, sink) {
        warn!("background scanner refused: {:?}", e);
    }

    // Heart-rate sensors, each reported once per window.
    let hrs = [DEMO_FILTER_UUID];
    let hrs_filter = ScanFilter {
        uuids: &hrs,
        period_ms: DEMO_FILTER_PERIOD_MS,
        ..Default::default()
    };
    if let Err(e) = manager.start_scan_with_filter(&app, &ScanSettings::from(HRS_SETTINGS), &hrs_filter, sink) {
        warn!("heart-rate scanner refused: {:?}", e);
    }

    // Scan responses for a while after boot, to pick up device names.
    let rsp_filter = ScanFilter {
        duration_ms: DEMO_ACTIVE_SCAN_DURATION_MS,
        active: true,
        ..Default::default()
    };
    if let Err(e) = manager.start_scan_with_filter(&app, &ScanSettings::with_mode(ScanMode::LowLatency), &rsp_filter, sink) {
        warn!("scan-response scanner refused: {:?}", e);
    }

    let events = RADIO_EVENTS.receiver();
    loop {
        let deadline = manager.next_deadline_ms();
        let expiry = async move {
            match deadline {
                Some(at) => Timer::at(Instant::from_millis(at)).await,
                None => core::future::pending::<()>().await,
            }
        };

        match select(events.receive(), expiry).await {
            Either::First(RadioEvent::Started { request, result }) => manager.on_radio_started(request, result),
            Either::First(RadioEvent::Report(report)) => {
                manager.dispatch_report(&report.as_report());
            }
            Either::Second(()) => {
                let expired = manager.expire_scanners();
                info!("{} scanner(s) reached their duration", expired);
            }
        }
    }
}
