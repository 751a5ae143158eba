//! NCP control state machine.
//!
//! ```text
//!   handle_event ─► observe ─► tasks (front first) ─► control
//!
//!   control:  Init ─► AwaitTasks ─► [Resume] ─► Yield ─► Select
//!                                                  ▲        │
//!                                                  │        ├─► Disabled
//!                                                  │        ├─► Associated
//!                                                  │        ├─► Offline
//!                                                  └────────┘   (Ready → Yield)
//! ```
//!
//! Everything runs synchronously inside [`NcpInstance::handle_event`].
//! Sub-processes suspend by returning `Poll::Pending` after scheduling
//! the deadline they wait for; the caller delivers a [`NcpEvent::Tick`]
//! once [`NcpInstance::next_wakeup`] passes.

mod associated;
mod disabled;
mod init;
mod offline;
mod resume;

use std::task::Poll;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::NcpConfig;
use crate::context::NcpContext;
use crate::device::NcpDevice;
use crate::error::NcpError;
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::properties::NcpProperties;
use crate::settings::SettingsStore;
use crate::spinel::{Capabilities, Property, SpinelCommand, SpinelFrame};
use crate::state::{DriverState, NcpState};
use crate::task::{Task, TaskResult, TaskStatus};

use associated::AssociatedProcess;
use disabled::DisabledProcess;
use init::InitProcess;
use offline::OfflineProcess;
use resume::ResumeProcess;

// ── Waits ────────────────────────────────────────────────────────

/// One check of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    Met,
    TimedOut,
    Pending,
}

/// Condition first, then deadline. A pending wait re-arms its deadline.
pub(crate) fn wait_within(
    ctx: &mut NcpContext,
    condition: bool,
    deadline: Instant,
    now: Instant,
) -> Wait {
    if condition {
        Wait::Met
    } else if now >= deadline {
        Wait::TimedOut
    } else {
        ctx.schedule(deadline);
        Wait::Pending
    }
}

// ── ControlPhase ─────────────────────────────────────────────────

/// Which part of the control loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPhase {
    Init,
    WaitingForTasks,
    Resume,
    /// Between sub-processes.
    Idle,
    Disabled,
    Associated,
    Offline,
    Fault,
}

enum Stage {
    Init,
    AwaitTasks,
    Resume(ResumeProcess),
    Yield,
    Select,
    Disabled(DisabledProcess),
    Associated(AssociatedProcess),
    Offline(OfflineProcess),
}

// ── NcpInstance ──────────────────────────────────────────────────

/// The host-side driver for one NCP.
pub struct NcpInstance {
    ctx: NcpContext,
    stage: Stage,
    init: InitProcess,
}

impl NcpInstance {
    pub fn new(config: &NcpConfig, device: Box<dyn NcpDevice>) -> Self {
        Self {
            ctx: NcpContext::new(config, device),
            stage: Stage::Init,
            init: InitProcess::new(),
        }
    }

    /// Feed one event. Returns the deadline by which the next
    /// [`NcpEvent::Tick`] is due, if any wait is armed.
    pub fn handle_event(&mut self, event: NcpEvent, now: Instant) -> Option<Instant> {
        self.ctx.clear_wakeup();
        if self.ctx.state == NcpState::Fault {
            self.restart_init();
            return None;
        }
        self.ctx.observe(&event);

        self.run_tasks(&event, now);
        self.run_control(&event, now);
        self.ctx.wakeup()
    }

    pub fn handle_frame(&mut self, frame: SpinelFrame, now: Instant) -> Option<Instant> {
        self.handle_event(NcpEvent::from_frame(frame), now)
    }

    /// The frame waiting for the link, if any. Once written, the caller
    /// delivers a `Tick` so the sender sees the flush complete.
    pub fn take_outbound(&mut self, now: Instant) -> Option<Bytes> {
        if self.ctx.state == NcpState::Fault {
            return None;
        }
        self.ctx.transport.take_pending(now)
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        self.ctx.wakeup()
    }

    fn run_tasks(&mut self, event: &NcpEvent, now: Instant) {
        while let Some(mut task) = self.ctx.tasks.pop_front() {
            match task.process_event(&mut self.ctx, event, now) {
                TaskStatus::Running => {
                    self.ctx.tasks.push_front(task);
                    break;
                }
                status => debug!("task {} {status:?}", task.name()),
            }
        }
    }

    fn run_control(&mut self, event: &NcpEvent, now: Instant) {
        loop {
            if self.ctx.take_reinit_request() {
                info!("reinitializing ncp");
                self.restart_init();
            }

            match &mut self.stage {
                Stage::Init => {
                    if self.init.poll(&mut self.ctx, event, now).is_pending() {
                        return;
                    }
                    if self.ctx.state == NcpState::Fault {
                        return;
                    }
                    self.stage = Stage::AwaitTasks;
                }

                Stage::AwaitTasks => {
                    if !self.ctx.tasks.is_empty() {
                        return;
                    }
                    self.stage = if self.ctx.should_auto_resume() {
                        info!("auto-resume enabled; resuming network");
                        Stage::Resume(ResumeProcess::new())
                    } else {
                        Stage::Yield
                    };
                }

                Stage::Resume(process) => {
                    if process.poll(&mut self.ctx, event, now).is_pending() {
                        return;
                    }
                    self.stage = Stage::Yield;
                }

                Stage::Yield => {
                    self.stage = Stage::Select;
                    self.ctx.schedule(now);
                    return;
                }

                Stage::Select => {
                    let state = self.ctx.state;
                    if state.is_initializing() {
                        self.restart_init();
                        self.ctx.schedule(now);
                        return;
                    } else if !self.ctx.is_enabled() {
                        info!("driver disabled");
                        self.stage = Stage::Disabled(DisabledProcess::new());
                    } else if state.is_joining_or_joined() {
                        self.stage = Stage::Associated(AssociatedProcess::new());
                    } else if !state.is_interface_up() {
                        self.stage = Stage::Offline(OfflineProcess::new());
                    } else {
                        warn!("unexpected ncp state {state}");
                        self.stage = Stage::Yield;
                        return;
                    }
                }

                Stage::Disabled(process) => {
                    if process.poll(&mut self.ctx, event, now).is_pending() {
                        return;
                    }
                    if self.ctx.is_enabled() {
                        info!("driver enabled");
                        self.restart_init();
                        self.ctx.schedule(now);
                        return;
                    }
                    self.stage = Stage::Yield;
                }

                Stage::Associated(process) => {
                    if process.poll(&mut self.ctx, event, now).is_pending() {
                        return;
                    }
                    self.stage = Stage::Yield;
                }

                Stage::Offline(process) => {
                    if process.poll(&mut self.ctx, event, now).is_pending() {
                        return;
                    }
                    self.stage = Stage::Yield;
                }
            }
        }
    }

    fn restart_init(&mut self) {
        self.stage = Stage::Init;
        self.init = InitProcess::new();
    }

    /// Full external restart. This is the only way out of `Fault`.
    pub fn reset_control(&mut self, now: Instant) {
        info!("restarting ncp control");
        if self.ctx.state == NcpState::Fault {
            self.ctx.change_state(NcpState::Uninitialized);
        }
        self.ctx.failure_count = 0;
        self.ctx.backoff.clear();
        self.ctx.transport.clear();
        self.restart_init();
        self.ctx.schedule(now);
    }

    // ── Host requests ────────────────────────────────────────────

    pub fn start_task(&mut self, task: Task, now: Instant) {
        self.ctx.start_task(task, now);
    }

    /// Read a property from the NCP. Fails with [`NcpError::Fault`] while
    /// the NCP is faulted.
    pub fn get_property(
        &mut self,
        property: Property,
        now: Instant,
    ) -> Result<oneshot::Receiver<TaskResult>, NcpError> {
        self.send_command(SpinelCommand::get(property), now)
    }

    /// Set a property on the NCP. Replayable properties are remembered
    /// once the NCP accepts them.
    pub fn set_property(
        &mut self,
        property: Property,
        value: impl Into<Bytes>,
        now: Instant,
    ) -> Result<oneshot::Receiver<TaskResult>, NcpError> {
        let rx = self.send_command(SpinelCommand::set(property, value), now)?;
        if property == Property::NetXpanid {
            self.ctx.flags.insert(NcpFlags::XPANID_EXPLICITLY_SET);
        }
        Ok(rx)
    }

    /// Stop replaying a property after resets.
    pub fn unset_property(&mut self, property: Property) -> bool {
        self.ctx.settings.remove(property).is_some()
    }

    /// Seed the replay store without talking to the NCP, e.g. from saved
    /// configuration. Applied at the next init.
    pub fn preload_setting(&mut self, property: Property, value: impl Into<Bytes>) -> bool {
        let Some(capability) = property.restore_capability() else {
            return false;
        };
        self.ctx
            .settings
            .remember(&SpinelCommand::set(property, value), capability)
    }

    fn send_command(
        &mut self,
        command: SpinelCommand,
        now: Instant,
    ) -> Result<oneshot::Receiver<TaskResult>, NcpError> {
        if self.ctx.state == NcpState::Fault {
            return Err(NcpError::Fault);
        }
        let (tx, rx) = oneshot::channel();
        self.ctx.start_task(Task::send_command(command, Some(tx)), now);
        Ok(rx)
    }

    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        self.set_flag(NcpFlags::ENABLED, enabled, now);
    }

    pub fn set_auto_deep_sleep(&mut self, enabled: bool, now: Instant) {
        self.set_flag(NcpFlags::AUTO_DEEP_SLEEP, enabled, now);
    }

    pub fn set_auto_resume(&mut self, enabled: bool, now: Instant) {
        self.set_flag(NcpFlags::AUTO_RESUME, enabled, now);
    }

    pub fn set_commissioned(&mut self, commissioned: bool, now: Instant) {
        self.set_flag(NcpFlags::COMMISSIONED, commissioned, now);
    }

    pub fn set_network_key(&mut self, key: impl Into<Bytes>, index: u32) {
        self.ctx.network_key = key.into();
        self.ctx.network_key_index = index;
    }

    /// Start a raw packet capture; it is re-enabled after every reset
    /// until the next successful init.
    pub fn begin_pcap(&mut self, now: Instant) -> Result<oneshot::Receiver<TaskResult>, NcpError> {
        let rx = self.send_command(SpinelCommand::set_bool(Property::MacRawStreamEnabled, true), now)?;
        self.ctx.flags.insert(NcpFlags::PCAP_IN_PROGRESS);
        Ok(rx)
    }

    fn set_flag(&mut self, flag: NcpFlags, on: bool, now: Instant) {
        if self.ctx.flags.contains(flag) != on {
            debug!(?flag, on, "flag changed");
            self.ctx.flags.set(flag, on);
        }
        self.ctx.schedule(now);
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn state(&self) -> NcpState {
        self.ctx.state
    }

    pub fn driver_state(&self) -> DriverState {
        self.ctx.driver_state
    }

    pub fn flags(&self) -> NcpFlags {
        self.ctx.flags
    }

    pub fn failure_count(&self) -> u32 {
        self.ctx.failure_count
    }

    pub fn control_phase(&self) -> ControlPhase {
        if self.ctx.state == NcpState::Fault {
            return ControlPhase::Fault;
        }
        match self.stage {
            Stage::Init => ControlPhase::Init,
            Stage::AwaitTasks => ControlPhase::WaitingForTasks,
            Stage::Resume(_) => ControlPhase::Resume,
            Stage::Yield | Stage::Select => ControlPhase::Idle,
            Stage::Disabled(_) => ControlPhase::Disabled,
            Stage::Associated(_) => ControlPhase::Associated,
            Stage::Offline(_) => ControlPhase::Offline,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.ctx.settings
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.ctx.capabilities
    }

    pub fn properties(&self) -> &NcpProperties {
        &self.ctx.props
    }

    pub fn pending_tasks(&self) -> usize {
        self.ctx.tasks.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────
