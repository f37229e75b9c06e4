//! Integration tests for the lescan public API.
//!
//! The manager runs against `ChannelRadio` and `ChannelSink`, the same
//! plumbing the firmware uses, with the test playing both the radio task
//! and the result consumer.

use core::cell::Cell;

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use lescan::scan::radio::OwnedAdvReport;
use lescan::scan::{AddrType, AdvReport, AdvType, BdAddr, RequestId};
use lescan::{
    BtInstance, ChannelRadio, ChannelSink, Clock, InstanceId, RadioCommand, RadioError, RadioEvent, ScanEvent,
    ScanFilter, ScanManager, ScanMode, ScanSettings, ScanStatus,
};

type Manager<'a, 'c> = ScanManager<'a, ChannelRadio<'c, NoopRawMutex, 4>, &'c Tick>;

#[derive(Default)]
struct Tick(Cell<u64>);

impl Clock for &Tick {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

struct App;

impl BtInstance for App {
    fn id(&self) -> InstanceId {
        InstanceId(42)
    }

    fn has_scan_permission(&self) -> bool {
        true
    }
}

/// Heart Rate service plus the name "HRM".
const HRM_ADV: [u8; 9] = [0x03, 0x03, 0x0D, 0x18, 0x04, 0x09, b'H', b'R', b'M'];
/// HID service only.
const KBD_ADV: [u8; 4] = [0x03, 0x03, 0x12, 0x18];

fn radio_report(addr: u8, data: &[u8]) -> RadioEvent {
    RadioEvent::Report(OwnedAdvReport::from_report(&AdvReport {
        addr: BdAddr([addr; 6]),
        addr_type: AddrType::Public,
        adv_type: AdvType::AdvInd,
        rssi: -61,
        data,
    }))
}

/// What the firmware control loop does with one radio event.
fn pump(mgr: &mut Manager<'_, '_>, event: RadioEvent) {
    match event {
        RadioEvent::Started { request, result } => mgr.on_radio_started(request, result),
        RadioEvent::Report(report) => {
            mgr.dispatch_report(&report.as_report());
        }
    }
}

/// Play the radio task: take the next start command and acknowledge it.
fn ack_next_start(commands: &Channel<NoopRawMutex, RadioCommand, 4>, mgr: &mut Manager<'_, '_>) -> u16 {
    match block_on(commands.receive()) {
        RadioCommand::Start { request, params } => {
            pump(mgr, RadioEvent::Started { request, result: Ok(()) });
            params.interval
        }
        RadioCommand::Stop => panic!("expected a start command"),
    }
}

#[test]
fn result_reaches_consumer_through_channels() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    let h = mgr.start_scan(&App, &sink).unwrap();
    assert!(events.is_empty());
    assert_eq!(ack_next_start(&commands, &mut mgr), 0x1000);
    assert_eq!(
        block_on(events.receive()),
        ScanEvent::StartStatus {
            scanner: h,
            status: ScanStatus::Success
        }
    );

    pump(&mut mgr, radio_report(1, &HRM_ADV));
    match block_on(events.receive()) {
        ScanEvent::Result { scanner, result } => {
            assert_eq!(scanner, h);
            let result = result.as_result();
            assert_eq!(result.addr, BdAddr([1; 6]));
            assert_eq!(result.local_name(), Some("HRM"));
        }
        other => panic!("expected a result, got {:?}", other),
    }

    mgr.stop_scan(&App, h).unwrap();
    assert_eq!(block_on(commands.receive()), RadioCommand::Stop);
    assert_eq!(block_on(events.receive()), ScanEvent::Stopped { scanner: h });
    assert!(events.is_empty());
}

#[test]
fn second_scanner_reprograms_after_first_ack() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    let all = mgr.start_scan(&App, &sink).unwrap();
    let hrs = [0x180D];
    let filter = ScanFilter {
        uuids: &hrs,
        duplicated: true,
        ..Default::default()
    };
    let hr_only = mgr
        .start_scan_with_filter(&App, &ScanSettings::with_mode(ScanMode::Balanced), &filter, &sink)
        .unwrap();

    // One request in flight at a time.
    assert_eq!(commands.len(), 1);
    assert_eq!(ack_next_start(&commands, &mut mgr), 0x1000);
    assert_eq!(ack_next_start(&commands, &mut mgr), 0x500);

    let started: Vec<_> = core::iter::from_fn(|| events.try_receive().ok()).collect();
    assert_eq!(
        started,
        [
            ScanEvent::StartStatus {
                scanner: all,
                status: ScanStatus::Success
            },
            ScanEvent::StartStatus {
                scanner: hr_only,
                status: ScanStatus::Success
            },
        ]
    );

    pump(&mut mgr, radio_report(2, &KBD_ADV));
    pump(&mut mgr, radio_report(3, &HRM_ADV));
    let receivers: Vec<_> = core::iter::from_fn(|| events.try_receive().ok())
        .map(|e| e.scanner())
        .collect();
    assert_eq!(receivers, [all, all, hr_only]);
}

#[test]
fn full_command_queue_fails_start() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    for _ in 0..4 {
        commands.try_send(RadioCommand::Stop).unwrap();
    }

    let h = mgr.start_scan(&App, &sink).unwrap();
    assert_eq!(
        events.try_receive(),
        Ok(ScanEvent::StartStatus {
            scanner: h,
            status: ScanStatus::StartFail
        })
    );
    assert_eq!(mgr.scanner_state(h), None);
    assert!(mgr.is_scan_supported(&App));
}

#[test]
fn radio_refusal_reported_to_scanner() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    let h = mgr.start_scan(&App, &sink).unwrap();
    let RadioCommand::Start { request, .. } = block_on(commands.receive()) else {
        panic!("expected a start command");
    };
    pump(
        &mut mgr,
        RadioEvent::Started {
            request,
            result: Err(RadioError::Rejected(0x07)),
        },
    );

    assert_eq!(
        events.try_receive(),
        Ok(ScanEvent::StartStatus {
            scanner: h,
            status: ScanStatus::StartFail
        })
    );
    assert!(commands.is_empty());
    assert_eq!(mgr.effective_params(), None);
}

#[test]
fn slow_consumer_keeps_lifecycle_events() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 4>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    let h = mgr.start_scan(&App, &sink).unwrap();
    ack_next_start(&commands, &mut mgr);
    for addr in 0..5 {
        pump(&mut mgr, radio_report(addr, &KBD_ADV));
    }
    mgr.stop_scan(&App, h).unwrap();

    let queued: Vec<_> = core::iter::from_fn(|| events.try_receive().ok()).collect();
    assert_eq!(queued.len(), 3);
    assert!(matches!(queued[0], ScanEvent::StartStatus { .. }));
    assert!(matches!(queued[1], ScanEvent::Result { .. }));
    assert_eq!(queued[2], ScanEvent::Stopped { scanner: h });
    assert_eq!(sink.dropped(), 4);
}

#[test]
fn scanner_expires_after_duration() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 4>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr: Manager = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);
    let filter = ScanFilter {
        duration_ms: 10_000,
        ..Default::default()
    };

    let h = mgr
        .start_scan_with_filter(&App, &ScanSettings::default(), &filter, &sink)
        .unwrap();
    clock.0.set(5);
    ack_next_start(&commands, &mut mgr);
    assert_eq!(mgr.next_deadline_ms(), Some(10_005));

    clock.0.set(10_005);
    assert_eq!(mgr.expire_scanners(), 1);
    assert_eq!(block_on(commands.receive()), RadioCommand::Stop);

    let tail: Vec<_> = core::iter::from_fn(|| events.try_receive().ok()).collect();
    assert_eq!(tail.last(), Some(&ScanEvent::Stopped { scanner: h }));
}

#[test]
fn refused_stop_is_retried_on_next_report() {
    let commands = Channel::<NoopRawMutex, RadioCommand, 1>::new();
    let events = Channel::<NoopRawMutex, ScanEvent, 8>::new();
    let sink = ChannelSink::new(&events);
    let clock = Tick::default();
    let mut mgr = ScanManager::new(ChannelRadio::new(commands.sender(), true), &clock);

    // The radio acks before the manager's queue slot frees up.
    let h = mgr.start_scan(&App, &sink).unwrap();
    mgr.on_radio_started(RequestId(1), Ok(()));
    let running = mgr.effective_params();
    assert!(running.is_some());

    mgr.stop_scan(&App, h).unwrap();
    assert_eq!(mgr.effective_params(), running);
    let tail: Vec<_> = core::iter::from_fn(|| events.try_receive().ok()).collect();
    assert_eq!(tail.last(), Some(&ScanEvent::Stopped { scanner: h }));

    assert!(matches!(block_on(commands.receive()), RadioCommand::Start { .. }));
    let report = AdvReport {
        addr: BdAddr([7; 6]),
        addr_type: AddrType::Public,
        adv_type: AdvType::AdvInd,
        rssi: -70,
        data: &KBD_ADV,
    };
    assert_eq!(mgr.dispatch_report(&report), 0);
    assert_eq!(commands.try_receive(), Ok(RadioCommand::Stop));
    assert_eq!(mgr.effective_params(), None);

    // Stopped for good: later reports do not resend it.
    mgr.dispatch_report(&report);
    assert!(commands.is_empty());
}
