//! Integration tests: an `NcpInstance` driven against a scripted NCP
//! with explicit, deterministic time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use ncp_core::{
    CommandId, ControlPhase, DriverState, Header, NcpConfig, NcpDevice, NcpError, NcpEvent,
    NcpFlags, NcpInstance, NcpState, Property, SpinelFrame, SpinelStatus, TaskError,
    UpgradeStatus, await_task,
};

// ── Fakes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceCall {
    Power(bool),
    HardReset,
    Upgrade,
}

#[derive(Debug, Default)]
struct Firmware {
    available: bool,
    status: UpgradeStatus,
}

#[derive(Clone, Default)]
struct MockDevice {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
    firmware: Arc<Mutex<Firmware>>,
}

impl NcpDevice for MockDevice {
    fn set_power(&mut self, on: bool) {
        self.calls.lock().unwrap().push(DeviceCall::Power(on));
    }

    fn hard_reset(&mut self) {
        self.calls.lock().unwrap().push(DeviceCall::HardReset);
    }

    fn upgrade_status(&self) -> UpgradeStatus {
        self.firmware.lock().unwrap().status
    }

    fn can_upgrade_firmware(&self) -> bool {
        self.firmware.lock().unwrap().available
    }

    fn upgrade_firmware(&mut self) {
        self.calls.lock().unwrap().push(DeviceCall::Upgrade);
        let mut firmware = self.firmware.lock().unwrap();
        firmware.available = false;
        firmware.status = UpgradeStatus::InProgress;
    }
}

/// Answers the way a healthy NCP would, unless told to stay quiet.
struct FakeNcp {
    values: HashMap<Property, Vec<u8>>,
    silent: HashSet<Property>,
    answer_noop: bool,
    received: Vec<SpinelFrame>,
}

impl FakeNcp {
    fn new() -> Self {
        let values = HashMap::from([
            (Property::ProtocolVersion, vec![4, 3]),
            (Property::NcpVersion, b"WISUN-NCP/1.2.0\0".to_vec()),
            (Property::InterfaceType, vec![3]),
            (Property::Caps, vec![13]),
            (Property::HwAddr, vec![0x00, 0x12, 0x4B, 0x00, 0x14, 0xF7, 0xD2, 0x2C]),
            (Property::NetIfUp, vec![0]),
            (Property::NetStackUp, vec![0]),
            (Property::NetRole, vec![0]),
            (Property::NetNetworkName, b"wisun-test\0".to_vec()),
        ]);
        Self {
            values,
            silent: HashSet::new(),
            answer_noop: true,
            received: Vec::new(),
        }
    }

    fn reply(&mut self, frame: SpinelFrame) -> Vec<SpinelFrame> {
        self.received.push(frame.clone());
        let header = frame.header;

        match (frame.command, frame.property()) {
            (CommandId::Noop, _) if self.answer_noop => {
                vec![SpinelFrame::last_status(header, SpinelStatus::OK)]
            }
            (CommandId::Noop, _) => vec![],
            (CommandId::Reset, _) => {
                self.power_cycle();
                vec![SpinelFrame::last_status(
                    Header::UNSOLICITED,
                    SpinelStatus::RESET_SOFTWARE,
                )]
            }
            (CommandId::PropValueGet, Some(p)) if self.silent.contains(&p) => vec![],
            (CommandId::PropValueGet, Some(p)) => match self.values.get(&p) {
                Some(value) => vec![SpinelFrame::value_is(header, p, value.clone())],
                None => vec![SpinelFrame::last_status(header, SpinelStatus::PROP_NOT_FOUND)],
            },
            (CommandId::PropValueSet, Some(p)) => {
                self.values.insert(p, frame.value.to_vec());
                let mut out = vec![SpinelFrame::value_is(header, p, frame.value.clone())];
                // Bringing the stack up joins at once.
                if p == Property::NetStackUp && frame.value[..] == [1] {
                    self.values.insert(Property::NetRole, vec![2]);
                    out.push(SpinelFrame::value_is(
                        Header::UNSOLICITED,
                        Property::NetRole,
                        vec![2],
                    ));
                }
                out
            }
            _ => vec![SpinelFrame::last_status(header, SpinelStatus::INVALID_COMMAND)],
        }
    }

    fn power_cycle(&mut self) {
        for p in [Property::NetIfUp, Property::NetStackUp, Property::NetRole] {
            self.values.insert(p, vec![0]);
        }
    }

    fn count(&self, command: CommandId) -> usize {
        self.received.iter().filter(|f| f.command == command).count()
    }

    fn sets_of(&self, property: Property) -> usize {
        self.received
            .iter()
            .filter(|f| f.command == CommandId::PropValueSet && f.property() == Some(property))
            .count()
    }

    fn gets_of(&self, property: Property) -> usize {
        self.received
            .iter()
            .filter(|f| f.command == CommandId::PropValueGet && f.property() == Some(property))
            .count()
    }
}

// ── Harness ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetKind {
    Soft,
    Hard,
}

struct Harness {
    ncp: NcpInstance,
    fake: FakeNcp,
    device: Arc<Mutex<Vec<DeviceCall>>>,
    firmware: Arc<Mutex<Firmware>>,
    seen_calls: usize,
    now: Instant,
    /// Every reset sent to the NCP with the failure count at that time.
    resets: Vec<(ResetKind, u32)>,
    /// State after every delivered event.
    states: Vec<NcpState>,
}

impl Harness {
    fn new(config: NcpConfig, fake: FakeNcp) -> Self {
        let device = MockDevice::default();
        let calls = device.calls.clone();
        let firmware = device.firmware.clone();
        let mut h = Self {
            ncp: NcpInstance::new(&config, Box::new(device)),
            fake,
            device: calls,
            firmware,
            seen_calls: 0,
            now: Instant::now(),
            resets: Vec::new(),
            states: Vec::new(),
        };
        h.deliver(NcpEvent::Tick);
        h
    }

    /// Start and let init run to completion.
    fn boot(config: NcpConfig, fake: FakeNcp) -> Self {
        let mut h = Self::new(config, fake);
        h.advance(Duration::from_secs(1));
        h
    }

    fn event(&mut self, event: NcpEvent) {
        self.ncp.handle_event(event, self.now);
        self.states.push(self.ncp.state());
    }

    fn deliver(&mut self, event: NcpEvent) {
        self.event(event);
        self.pump();
    }

    /// Move frames across the link until it goes quiet: write, report the
    /// flush, then deliver whatever the NCP answers.
    fn pump(&mut self) {
        for _ in 0..10_000 {
            if self.take_hard_reset() {
                self.resets.push((ResetKind::Hard, self.ncp.failure_count()));
                self.fake.power_cycle();
                self.event(NcpEvent::Reset(SpinelStatus::RESET_EXTERNAL));
                continue;
            }
            let Some(bytes) = self.ncp.take_outbound(self.now) else {
                return;
            };
            let frame = SpinelFrame::decode(&bytes).unwrap();
            if frame.command == CommandId::Reset {
                self.resets.push((ResetKind::Soft, self.ncp.failure_count()));
            }
            let replies = self.fake.reply(frame);
            self.event(NcpEvent::Tick);
            for reply in replies {
                self.event(NcpEvent::from_frame(reply));
            }
        }
        panic!("link never went quiet");
    }

    fn take_hard_reset(&mut self) -> bool {
        let calls = self.device.lock().unwrap();
        let fresh = calls[self.seen_calls..].contains(&DeviceCall::HardReset);
        self.seen_calls = calls.len();
        fresh
    }

    fn run_until(&mut self, target: Instant) {
        for _ in 0..100_000 {
            match self.ncp.next_wakeup() {
                Some(at) if at <= target => {
                    self.now = self.now.max(at);
                    self.deliver(NcpEvent::Tick);
                }
                _ => {
                    self.now = target;
                    return;
                }
            }
        }
        panic!("wakeups never settled");
    }

    fn advance(&mut self, by: Duration) {
        self.run_until(self.now + by);
    }

    fn device_calls(&self) -> Vec<DeviceCall> {
        self.device.lock().unwrap().clone()
    }

    fn set_upgrade_status(&self, status: UpgradeStatus) {
        self.firmware.lock().unwrap().status = status;
    }
}

// ── Init ─────────────────────────────────────────────────────────

#[test]
fn enabled_init_refreshes_properties() {
    let h = Harness::boot(NcpConfig::default(), FakeNcp::new());

    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.driver_state(), DriverState::NormalOperation);
    assert_eq!(h.ncp.failure_count(), 0);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Offline);

    let props = h.ncp.properties();
    assert_eq!(props.protocol_version, (4, 3));
    assert_eq!(props.ncp_version, "WISUN-NCP/1.2.0");
    assert_eq!(props.network_name, "wisun-test");
    // The allow-list is only fetched when advertised.
    assert_eq!(h.fake.gets_of(Property::MacFilterList), 0);
    assert_eq!(h.fake.gets_of(Property::NetRole), 1);
}

#[test]
fn disabled_init_skips_refresh_and_replay() {
    let config = NcpConfig {
        enabled: false,
        ..NcpConfig::default()
    };
    let mut h = Harness::new(config, FakeNcp::new());
    h.ncp.preload_setting(Property::PhyTxPower, vec![7]);
    h.advance(Duration::from_secs(1));

    assert_eq!(h.ncp.failure_count(), 0);
    assert_eq!(h.ncp.driver_state(), DriverState::NormalOperation);
    let queried: Vec<_> = h.fake.received.iter().filter_map(|f| f.property()).collect();
    assert_eq!(queried, [Property::ProtocolVersion, Property::NetStackUp]);
    assert_eq!(h.fake.count(CommandId::PropValueSet), 0);

    // Nothing else to do while disabled: the NCP is parked.
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Disabled);
    assert!(h.device_calls().contains(&DeviceCall::Power(false)));
}

#[test]
fn repeated_version_timeouts_alternate_resets_then_fault() {
    let mut fake = FakeNcp::new();
    fake.silent.insert(Property::ProtocolVersion);
    let mut h = Harness::new(NcpConfig::default(), fake);
    h.advance(Duration::from_secs(120));

    assert_eq!(
        h.resets,
        [(ResetKind::Soft, 1), (ResetKind::Hard, 2), (ResetKind::Soft, 3)]
    );
    assert_eq!(h.fake.gets_of(Property::ProtocolVersion), 4);
    assert_eq!(h.ncp.state(), NcpState::Fault);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Fault);

    // Nothing is sent while faulted.
    let sent = h.fake.received.len();
    h.deliver(NcpEvent::Tick);
    h.advance(Duration::from_secs(600));
    assert_eq!(h.fake.received.len(), sent);
    assert_eq!(h.ncp.next_wakeup(), None);

    // An external restart recovers once the NCP behaves.
    h.fake.silent.clear();
    h.ncp.reset_control(h.now);
    h.advance(Duration::from_secs(1));
    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.failure_count(), 0);
}

#[test]
fn unexpected_reset_reinitializes() {
    let mut h = Harness::boot(NcpConfig::default(), FakeNcp::new());
    let versions = h.fake.gets_of(Property::ProtocolVersion);

    h.deliver(NcpEvent::Reset(SpinelStatus::RESET_CRASH));
    assert_eq!(h.ncp.state(), NcpState::Uninitialized);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Init);

    h.advance(Duration::from_secs(1));
    assert_eq!(h.fake.gets_of(Property::ProtocolVersion), versions + 1);
    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.failure_count(), 0);
}

#[test]
fn capture_is_reenabled_after_reset_until_init_finishes() {
    let mut h = Harness::boot(NcpConfig::default(), FakeNcp::new());
    let _capture = h.ncp.begin_pcap(h.now).unwrap();
    h.advance(Duration::ZERO);
    assert_eq!(h.fake.sets_of(Property::MacRawStreamEnabled), 1);
    assert!(h.ncp.flags().contains(NcpFlags::PCAP_IN_PROGRESS));

    let mark = h.fake.received.len();
    h.deliver(NcpEvent::Reset(SpinelStatus::RESET_CRASH));
    h.advance(Duration::from_secs(1));
    assert_eq!(h.fake.sets_of(Property::MacRawStreamEnabled), 2);
    let after: Vec<_> = h.fake.received[mark..]
        .iter()
        .map(|f| (f.command, f.property()))
        .collect();
    let pcap = after
        .iter()
        .position(|&c| c == (CommandId::PropValueSet, Some(Property::MacRawStreamEnabled)))
        .unwrap();
    let refresh = after
        .iter()
        .position(|&c| c == (CommandId::PropValueGet, Some(Property::NcpVersion)))
        .unwrap();
    assert!(pcap < refresh);
    assert!(!h.ncp.flags().contains(NcpFlags::PCAP_IN_PROGRESS));

    h.deliver(NcpEvent::Reset(SpinelStatus::RESET_CRASH));
    h.advance(Duration::from_secs(1));
    assert_eq!(h.fake.sets_of(Property::MacRawStreamEnabled), 2);
    assert_eq!(h.ncp.state(), NcpState::Offline);
}

// ── Firmware upgrade ─────────────────────────────────────────────

fn upgrading_harness() -> Harness {
    let config = NcpConfig {
        auto_update_firmware: true,
        ..NcpConfig::default()
    };
    let mut fake = FakeNcp::new();
    fake.silent.insert(Property::ProtocolVersion);
    let mut h = Harness::new(config, fake);
    h.firmware.lock().unwrap().available = true;
    h.advance(Duration::from_secs(60));
    h
}

#[test]
fn repeated_failures_trigger_firmware_update() {
    let mut h = upgrading_harness();

    assert_eq!(h.resets, [(ResetKind::Soft, 1), (ResetKind::Hard, 2)]);
    let upgrades = h.device_calls().iter().filter(|&&c| c == DeviceCall::Upgrade).count();
    assert_eq!(upgrades, 1);
    assert_eq!(h.ncp.state(), NcpState::Upgrading);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Init);
    let versions = h.fake.gets_of(Property::ProtocolVersion);

    // Still flashing: nothing goes out.
    h.advance(Duration::from_secs(10));
    assert_eq!(h.fake.gets_of(Property::ProtocolVersion), versions);

    h.set_upgrade_status(UpgradeStatus::Complete);
    h.fake.silent.clear();
    h.advance(Duration::from_secs(2));
    assert_eq!(h.resets.last(), Some(&(ResetKind::Soft, 3)));
    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.failure_count(), 0);
}

#[test]
fn failed_firmware_update_faults_and_cancels_tasks() {
    let mut h = upgrading_harness();
    assert_eq!(h.ncp.state(), NcpState::Upgrading);

    let mut rx = h.ncp.get_property(Property::ProtocolVersion, h.now).unwrap();
    h.advance(Duration::ZERO);
    h.set_upgrade_status(UpgradeStatus::Failed(-5));
    h.advance(Duration::from_secs(2));

    assert_eq!(h.ncp.state(), NcpState::Fault);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Fault);
    assert_eq!(
        rx.try_recv().unwrap(),
        Err(TaskError::InvalidState(NcpState::Fault))
    );
    assert!(h.ncp.take_outbound(h.now).is_none());
    assert_eq!(h.ncp.pending_tasks(), 0);
}

// ── Associated / resume ──────────────────────────────────────────

#[test]
fn auto_resume_joins_after_init() {
    let config = NcpConfig {
        commissioned: true,
        auto_resume: true,
        ..NcpConfig::default()
    };
    let h = Harness::boot(config, FakeNcp::new());

    assert_eq!(h.fake.sets_of(Property::NetIfUp), 1);
    assert_eq!(h.fake.sets_of(Property::NetStackUp), 1);
    assert_eq!(h.ncp.state(), NcpState::Associated);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Associated);
}

#[test]
fn unanswered_keepalive_triggers_reinit_not_fault() {
    let config = NcpConfig {
        commissioned: true,
        auto_resume: true,
        ..NcpConfig::default()
    };
    let mut h = Harness::boot(config, FakeNcp::new());
    assert_eq!(h.ncp.control_phase(), ControlPhase::Associated);
    h.fake.answer_noop = false;

    h.advance(Duration::from_secs(58));
    assert_eq!(h.fake.count(CommandId::Noop), 0);

    h.advance(Duration::from_secs(3));
    assert_eq!(h.fake.count(CommandId::Noop), 1);
    let versions = h.fake.gets_of(Property::ProtocolVersion);
    let mark = h.states.len();

    h.advance(Duration::from_secs(6));
    assert!(h.states[mark..].contains(&NcpState::Uninitialized));
    assert!(h.fake.gets_of(Property::ProtocolVersion) > versions);
    assert!(!h.states.contains(&NcpState::Fault));
}

#[test]
fn answered_keepalive_keeps_association() {
    let config = NcpConfig {
        commissioned: true,
        auto_resume: true,
        ..NcpConfig::default()
    };
    let mut h = Harness::boot(config, FakeNcp::new());
    h.advance(Duration::from_secs(125));

    assert_eq!(h.fake.count(CommandId::Noop), 2);
    assert_eq!(h.ncp.state(), NcpState::Associated);
    assert_eq!(h.fake.gets_of(Property::ProtocolVersion), 1);
}

// ── Offline ──────────────────────────────────────────────────────

#[test]
fn idle_offline_ncp_sleeps_once() {
    let config = NcpConfig {
        auto_deep_sleep: true,
        ..NcpConfig::default()
    };
    let mut h = Harness::boot(config, FakeNcp::new());
    assert_eq!(h.ncp.control_phase(), ControlPhase::Offline);

    h.advance(Duration::from_secs(8));
    assert_eq!(h.fake.sets_of(Property::McuPowerState), 0);

    h.advance(Duration::from_secs(3));
    assert_eq!(h.fake.sets_of(Property::McuPowerState), 1);
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);

    h.advance(Duration::from_secs(60));
    assert_eq!(h.fake.sets_of(Property::McuPowerState), 1);
}

#[test]
fn keyed_setup_gets_longer_idle_period() {
    let config = NcpConfig {
        auto_deep_sleep: true,
        ..NcpConfig::default()
    };
    let mut h = Harness::new(config, FakeNcp::new());
    h.ncp.set_network_key(vec![0xA5; 16], 0);
    h.advance(Duration::from_secs(15));
    assert_eq!(h.ncp.state(), NcpState::Offline);

    h.advance(Duration::from_secs(60));
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);
}

// ── Disabled ─────────────────────────────────────────────────────

#[test]
fn sleeping_disabled_ncp_is_tickled_then_woken() {
    let config = NcpConfig {
        enabled: false,
        ..NcpConfig::default()
    };
    let mut h = Harness::boot(config, FakeNcp::new());
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);

    h.advance(Duration::from_secs(15 * 60 + 1));
    assert_eq!(h.fake.count(CommandId::Reset), 1);
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Disabled);

    h.ncp.set_enabled(true, h.now);
    h.advance(Duration::from_secs(1));
    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.control_phase(), ControlPhase::Offline);
    assert_eq!(h.device_calls().last(), Some(&DeviceCall::Power(true)));
}

#[test]
fn unsent_tickle_reset_is_not_expected() {
    let config = NcpConfig {
        enabled: false,
        ..NcpConfig::default()
    };
    let mut h = Harness::boot(config, FakeNcp::new());
    assert_eq!(h.ncp.state(), NcpState::DeepSleep);

    // The tickle reset is queued but the link never takes it.
    h.now = h.ncp.next_wakeup().unwrap();
    h.event(NcpEvent::Tick);
    let flush_deadline = h.ncp.next_wakeup().unwrap();
    assert!(flush_deadline > h.now);
    h.now = flush_deadline;
    h.event(NcpEvent::Tick);
    assert!(!h.ncp.flags().contains(NcpFlags::RESET_EXPECTED));

    h.ncp.set_enabled(true, h.now);
    h.advance(Duration::from_secs(20));
    assert!(h.resets.is_empty());
    assert_eq!(h.ncp.failure_count(), 0);
    assert_eq!(h.ncp.state(), NcpState::Offline);
}

// ── Settings replay ──────────────────────────────────────────────

#[test]
fn replay_keeps_order_and_skips_unmet_or_oversize() {
    let config = NcpConfig {
        outbound_buffer_size: 64,
        ..NcpConfig::default()
    };
    let mut h = Harness::new(config, FakeNcp::new());
    h.ncp.preload_setting(Property::PhyTxPower, vec![10]);
    // Needs MAC_ALLOWLIST, which the fake does not advertise.
    h.ncp.preload_setting(Property::MacFilterMode, vec![1]);
    h.ncp.preload_setting(Property::PhyUnicastChannelList, vec![0xFF; 100]);
    h.ncp.preload_setting(Property::Mac154Panid, vec![0x34, 0x12]);
    h.advance(Duration::from_secs(1));

    let sets: Vec<_> = h
        .fake
        .received
        .iter()
        .filter(|f| f.command == CommandId::PropValueSet)
        .collect();
    let order: Vec<_> = sets.iter().filter_map(|f| f.property()).collect();
    assert_eq!(order, [Property::PhyTxPower, Property::Mac154Panid]);
    for frame in sets {
        let stored = h.ncp.settings().get(frame.property().unwrap()).unwrap();
        assert_eq!(frame.body(), stored.command);
    }
    assert_eq!(h.ncp.properties().pan_id, 0x1234);
    assert_eq!(h.ncp.state(), NcpState::Offline);
    assert_eq!(h.ncp.failure_count(), 0);
}

#[test]
fn settings_survive_reset_modulo_unset() {
    let mut h = Harness::boot(NcpConfig::default(), FakeNcp::new());

    let tx_power = h.ncp.set_property(Property::PhyTxPower, vec![12], h.now).unwrap();
    let panid = h.ncp.set_property(Property::Mac154Panid, vec![0xCD, 0xAB], h.now).unwrap();
    h.advance(Duration::ZERO);

    assert_eq!(
        tokio_test::block_on(await_task(panid)).unwrap(),
        Bytes::from_static(&[0xCD, 0xAB])
    );
    assert!(tokio_test::block_on(await_task(tx_power)).is_ok());
    assert_eq!(h.ncp.settings().len(), 2);

    let stored = h.ncp.settings().get(Property::Mac154Panid).unwrap().command.clone();
    assert!(h.ncp.unset_property(Property::PhyTxPower));

    let mark = h.fake.received.len();
    h.deliver(NcpEvent::Reset(SpinelStatus::RESET_CRASH));
    h.advance(Duration::from_secs(1));

    let replayed: Vec<_> = h.fake.received[mark..]
        .iter()
        .filter(|f| f.command == CommandId::PropValueSet)
        .collect();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].body(), stored);
    assert_eq!(h.ncp.driver_state(), DriverState::NormalOperation);
}

// ── Transport ────────────────────────────────────────────────────

#[test]
fn second_command_waits_for_first_reply() {
    let mut h = Harness::boot(NcpConfig::default(), FakeNcp::new());
    let now = h.now;
    let _version = h.ncp.get_property(Property::NcpVersion, now).unwrap();
    let hwaddr = h.ncp.get_property(Property::HwAddr, now).unwrap();

    h.ncp.handle_event(NcpEvent::Tick, now);
    let first = h.ncp.take_outbound(now).expect("first frame");
    h.ncp.handle_event(NcpEvent::Tick, now);
    assert!(h.ncp.take_outbound(now).is_none());

    for reply in h.fake.reply(SpinelFrame::decode(&first).unwrap()) {
        h.ncp.handle_event(NcpEvent::from_frame(reply), now);
    }
    let second = h.ncp.take_outbound(now).expect("second frame");
    let second = SpinelFrame::decode(&second).unwrap();
    assert_eq!(second.property(), Some(Property::HwAddr));

    for reply in h.fake.reply(second) {
        h.ncp.handle_event(NcpEvent::from_frame(reply), now);
    }
    h.ncp.handle_event(NcpEvent::Tick, now);
    let value = tokio_test::block_on(await_task(hwaddr)).unwrap();
    assert_eq!(value.len(), 8);
}

#[test]
fn faulted_instance_refuses_tasks() {
    let mut fake = FakeNcp::new();
    fake.silent.insert(Property::ProtocolVersion);
    let mut h = Harness::new(NcpConfig::default(), fake);
    h.advance(Duration::from_secs(120));
    assert_eq!(h.ncp.state(), NcpState::Fault);

    assert!(matches!(
        h.ncp.get_property(Property::NcpVersion, h.now),
        Err(NcpError::Fault)
    ));
    assert!(h.ncp.take_outbound(h.now).is_none());
}
