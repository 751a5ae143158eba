//! Session context shared by the control sub-processes and tasks.
//!
//! One `NcpContext` lives for the whole daemon run. Sub-processes and
//! tasks receive it by `&mut` on every event; nothing here is global.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::backoff::RunawayResetBackoff;
use crate::config::{NcpConfig, PhyDefaults, Timeouts};
use crate::device::NcpDevice;
use crate::error::TaskError;
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::properties::NcpProperties;
use crate::settings::SettingsStore;
use crate::spinel::{Capabilities, CommandId, Property, SpinelFrame, SpinelStatus};
use crate::state::{DriverState, NcpState};
use crate::task::{Task, TaskQueue};
use crate::transport::CommandTransport;

pub struct NcpContext {
    pub(crate) state: NcpState,
    pub(crate) driver_state: DriverState,
    pub(crate) flags: NcpFlags,
    pub(crate) auto_deep_sleep_timeout: Duration,

    // ── Failure tracking ─────────────────────────────────────────
    pub(crate) failure_count: u32,
    pub(crate) failure_threshold: u32,
    pub(crate) backoff: RunawayResetBackoff,

    // ── I/O ──────────────────────────────────────────────────────
    pub(crate) timeouts: Timeouts,
    pub(crate) transport: CommandTransport,
    pub(crate) tasks: TaskQueue,
    pub(crate) device: Box<dyn NcpDevice>,

    // ── NCP view ─────────────────────────────────────────────────
    pub(crate) settings: SettingsStore,
    pub(crate) capabilities: Capabilities,
    pub(crate) props: NcpProperties,
    pub(crate) defaults: PhyDefaults,
    pub(crate) network_key: Bytes,
    pub(crate) network_key_index: u32,

    /// Init is running (`set_initializing_ncp`).
    pub(crate) initializing: bool,
    wakeup: Option<Instant>,
    reinit_requested: bool,
}

impl NcpContext {
    pub fn new(config: &NcpConfig, device: Box<dyn NcpDevice>) -> Self {
        let timeouts = config.timeouts();
        Self {
            state: NcpState::Uninitialized,
            driver_state: DriverState::default(),
            flags: NcpFlags::from_config(config),
            auto_deep_sleep_timeout: config.auto_deep_sleep_timeout(),
            failure_count: 0,
            failure_threshold: config.failure_threshold,
            backoff: RunawayResetBackoff::new(),
            timeouts,
            transport: CommandTransport::new(config.outbound_buffer_size, timeouts.response),
            tasks: TaskQueue::new(),
            device,
            settings: SettingsStore::new(),
            capabilities: Capabilities::new(),
            props: NcpProperties::with_defaults(&config.phy),
            defaults: config.phy.clone(),
            network_key: Bytes::new(),
            network_key_index: 0,
            initializing: false,
            wakeup: None,
            reinit_requested: false,
        }
    }

    // ── Scheduling ───────────────────────────────────────────────

    /// Ask to be called again no later than `deadline`.
    pub(crate) fn schedule(&mut self, deadline: Instant) {
        self.wakeup = Some(self.wakeup.map_or(deadline, |w| w.min(deadline)));
    }

    pub(crate) fn wakeup(&self) -> Option<Instant> {
        self.wakeup
    }

    pub(crate) fn clear_wakeup(&mut self) {
        self.wakeup = None;
    }

    /// Abandon the active sub-process and run init from the top.
    pub(crate) fn request_reinit(&mut self) {
        self.reinit_requested = true;
    }

    pub(crate) fn take_reinit_request(&mut self) -> bool {
        std::mem::take(&mut self.reinit_requested)
    }

    // ── State ────────────────────────────────────────────────────

    pub(crate) fn change_state(&mut self, new: NcpState) {
        if self.state == new {
            return;
        }
        if new == NcpState::Fault {
            error!("ncp state {} -> {new}", self.state);
        } else {
            info!("ncp state {} -> {new}", self.state);
        }
        self.state = new;
    }

    /// Give up on the NCP until an external restart.
    pub(crate) fn enter_fault(&mut self) {
        self.change_state(NcpState::Fault);
        self.initializing = false;
        self.reset_tasks(TaskError::InvalidState(NcpState::Fault));
        self.transport.clear();
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.flags.contains(NcpFlags::ENABLED)
    }

    /// Where an interface-down NCP rests.
    pub(crate) fn offline_state(&self) -> NcpState {
        if self.flags.contains(NcpFlags::COMMISSIONED) {
            NcpState::Commissioned
        } else {
            NcpState::Offline
        }
    }

    pub(crate) fn is_busy(&self, now: Instant) -> bool {
        if self.state == NcpState::Fault {
            return false;
        }
        self.initializing
            || self.driver_state != DriverState::NormalOperation
            || self.state == NcpState::Upgrading
            || !self.tasks.is_empty()
            || !self.transport.is_clear_to_send(now)
    }

    pub(crate) fn should_auto_resume(&self) -> bool {
        self.flags
            .contains(NcpFlags::AUTO_RESUME | NcpFlags::ENABLED | NcpFlags::COMMISSIONED)
            && !self.state.is_joining_or_joined()
            && !self.state.is_initializing()
    }

    /// Idle time before auto deep sleep; keyed setups get a minute more.
    pub(crate) fn sleep_timeout(&self) -> Duration {
        if !self.network_key.is_empty() || self.network_key_index != 0 {
            self.auto_deep_sleep_timeout + Duration::from_secs(60)
        } else {
            self.auto_deep_sleep_timeout
        }
    }

    // ── Tasks ────────────────────────────────────────────────────

    /// Queue a task. Fails it at once while the NCP is faulted.
    pub(crate) fn start_task(&mut self, mut task: Task, now: Instant) {
        if self.state == NcpState::Fault {
            warn!("refusing task {} in fault state", task.name());
            task.finish(Err(TaskError::InvalidState(self.state)));
            return;
        }
        debug!("queued task {}", task.name());
        self.tasks.push_back(task);
        self.schedule(now);
    }

    /// Finish and drop every queued task.
    pub(crate) fn reset_tasks(&mut self, error: TaskError) {
        for mut task in self.tasks.drain() {
            debug!("finishing task {}: {error}", task.name());
            task.finish(Err(error.clone()));
        }
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Apply an event to the host view before anything else sees it.
    pub(crate) fn observe(&mut self, event: &NcpEvent) {
        self.transport.observe(event);
        match event {
            NcpEvent::Reset(status) => self.observe_reset(*status),
            NcpEvent::Frame(frame) if frame.command == CommandId::PropValueIs => {
                self.observe_property(frame)
            }
            _ => {}
        }
    }

    fn observe_reset(&mut self, status: SpinelStatus) {
        if self.flags.contains(NcpFlags::RESET_EXPECTED) {
            self.flags.remove(NcpFlags::RESET_EXPECTED);
            info!("ncp reset: {status}");
            return;
        }
        if self.driver_state != DriverState::NormalOperation {
            info!("ncp reset during init: {status}");
            return;
        }
        warn!("ncp unexpectedly reset: {status}");
        self.reset_tasks(TaskError::NcpReset);
        self.change_state(NcpState::Uninitialized);
        self.request_reinit();
    }

    fn observe_property(&mut self, frame: &SpinelFrame) {
        let Some(property) = frame.property() else {
            debug!(key = ?frame.key, "ignoring unknown property");
            return;
        };
        match property {
            Property::LastStatus => return,
            Property::Caps => match Capabilities::from_packed(&frame.value) {
                Ok(caps) => {
                    debug!("ncp advertises {} capabilities", caps.len());
                    self.capabilities = caps;
                }
                Err(e) => warn!("malformed CAPS: {e}"),
            },
            _ => {
                if let Err(e) = self.props.apply(property, &frame.value) {
                    warn!("malformed {property}: {e}");
                    return;
                }
            }
        }

        if matches!(self.state, NcpState::Fault | NcpState::Upgrading) || self.state.is_sleeping() {
            return;
        }
        match property {
            Property::NetStackUp | Property::NetRole => {
                if !self.props.stack_up {
                    if property == Property::NetStackUp {
                        self.change_state(self.offline_state());
                    }
                } else if self.props.role != 0 {
                    if !self.state.is_joined() {
                        self.change_state(NcpState::Associated);
                    }
                } else if !self.state.is_joining() {
                    self.change_state(NcpState::Associating);
                }
            }
            Property::NetIfUp => {
                if !self.props.if_up && self.state.is_joining_or_joined() {
                    self.change_state(self.offline_state());
                }
            }
            _ => {}
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spinel::{Capability, Header};

    struct NullDevice;

    impl NcpDevice for NullDevice {
        fn set_power(&mut self, _on: bool) {}
        fn hard_reset(&mut self) {}
    }

    fn context() -> NcpContext {
        NcpContext::new(&NcpConfig::default(), Box::new(NullDevice))
    }

    fn value_is(property: Property, value: &[u8]) -> NcpEvent {
        NcpEvent::Frame(SpinelFrame::value_is(Header::new(0, 1), property, value.to_vec()))
    }

    #[test]
    fn schedule_keeps_earliest() {
        let mut ctx = context();
        let now = Instant::now();
        ctx.schedule(now + Duration::from_secs(5));
        ctx.schedule(now + Duration::from_secs(1));
        ctx.schedule(now + Duration::from_secs(3));
        assert_eq!(ctx.wakeup(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn stack_down_leaves_uninitialized() {
        let mut ctx = context();
        ctx.observe(&value_is(Property::NetStackUp, &[0]));
        assert_eq!(ctx.state, NcpState::Offline);

        ctx.flags.insert(NcpFlags::COMMISSIONED);
        ctx.state = NcpState::Uninitialized;
        ctx.observe(&value_is(Property::NetStackUp, &[0]));
        assert_eq!(ctx.state, NcpState::Commissioned);
    }

    #[test]
    fn stack_up_then_role_associates() {
        let mut ctx = context();
        ctx.observe(&value_is(Property::NetStackUp, &[1]));
        assert_eq!(ctx.state, NcpState::Associating);
        ctx.observe(&value_is(Property::NetRole, &[2]));
        assert_eq!(ctx.state, NcpState::Associated);
        ctx.observe(&value_is(Property::NetIfUp, &[0]));
        assert_eq!(ctx.state, NcpState::Offline);
    }

    #[test]
    fn caps_replace_capability_set() {
        let mut ctx = context();
        ctx.capabilities.insert(Capability::LOCK);
        ctx.observe(&value_is(Property::Caps, &[13, 64]));
        assert!(ctx.capabilities.contains(Capability::MCU_POWER_STATE));
        assert!(!ctx.capabilities.contains(Capability::LOCK));
    }

    #[test]
    fn expected_reset_only_clears_flag() {
        let mut ctx = context();
        ctx.driver_state = DriverState::NormalOperation;
        ctx.flags.insert(NcpFlags::RESET_EXPECTED);
        ctx.state = NcpState::Offline;

        ctx.observe(&NcpEvent::Reset(SpinelStatus::RESET_SOFTWARE));
        assert!(!ctx.flags.contains(NcpFlags::RESET_EXPECTED));
        assert!(!ctx.take_reinit_request());
        assert_eq!(ctx.state, NcpState::Offline);
    }

    #[test]
    fn unexpected_reset_requests_reinit() {
        let mut ctx = context();
        ctx.driver_state = DriverState::NormalOperation;
        ctx.state = NcpState::Associated;

        ctx.observe(&NcpEvent::Reset(SpinelStatus::RESET_CRASH));
        assert_eq!(ctx.state, NcpState::Uninitialized);
        assert!(ctx.take_reinit_request());
        assert!(!ctx.take_reinit_request());
    }

    #[test]
    fn faulted_context_refuses_tasks() {
        let mut ctx = context();
        ctx.state = NcpState::Fault;
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        ctx.start_task(Task::deep_sleep(Some(tx)), Instant::now());
        assert!(ctx.tasks.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(TaskError::InvalidState(NcpState::Fault))
        );
    }

    #[test]
    fn keyed_setup_sleeps_later() {
        let mut ctx = context();
        let base = ctx.sleep_timeout();
        ctx.network_key_index = 1;
        assert_eq!(ctx.sleep_timeout(), base + Duration::from_secs(60));
    }
}
