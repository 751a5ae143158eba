//! Init sub-process: bring the NCP from an unknown state to a fully
//! synchronized one.
//!
//! ```text
//!  Start ─► Begin ─► (await expected reset | backoff)
//!              ┌──────────────────────────────────┐
//!              ▼                                  │
//!           Settle ─► CheckRetry ─► [reset + AwaitReset]
//!              │            │                     │
//!              │          Fault        QueryVersion ─► QueryStackUp
//!              │                                  │
//!              │          CheckJoining ─► EnablePcap ─► Fetch ─► Replay ─► Finish
//!              │                                  │
//!              └──── ErrorSleep ◄── Failed ◄──────┘ (mandatory step failed)
//! ```

use std::task::Poll;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::{Wait, wait_within};
use crate::context::NcpContext;
use crate::device::UpgradeStatus;
use crate::error::{NcpError, TaskError};
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::spinel::{Capability, Property, SpinelCommand, SpinelStatus};
use crate::state::{DriverState, NcpState};
use crate::transport::Exchange;

const SETTLE_DELAY: Duration = Duration::from_millis(100);
const ERROR_DELAY: Duration = Duration::from_millis(500);
const UPGRADE_POLL: Duration = Duration::from_secs(1);

/// Properties refreshed after every init, in order.
const FETCH_LIST: &[(Property, Option<Capability>)] = &[
    (Property::ProtocolVersion, None),
    (Property::NcpVersion, None),
    (Property::InterfaceType, None),
    (Property::Caps, None),
    (Property::HwAddr, None),
    (Property::PhyCcaThreshold, None),
    (Property::PhyTxPower, None),
    (Property::PhyRegion, None),
    (Property::PhyModeId, None),
    (Property::PhyUnicastChannelList, None),
    (Property::PhyBroadcastChannelList, None),
    (Property::PhyAsyncChannelList, None),
    (Property::PhyChSpacing, None),
    (Property::PhyCh0CenterFreq, None),
    (Property::Mac154Panid, None),
    (Property::MacUcDwellInterval, None),
    (Property::MacBcDwellInterval, None),
    (Property::MacBcInterval, None),
    (Property::MacUcChannelFunction, None),
    (Property::MacBcChannelFunction, None),
    (Property::MacFilterList, Some(Capability::MAC_ALLOWLIST)),
    (Property::NetIfUp, None),
    (Property::NetStackUp, None),
    (Property::NetRole, None),
    (Property::NetNetworkName, None),
];

#[derive(Debug)]
enum InitStep {
    Start,
    AwaitUpgrade,
    Begin,
    AwaitExpectedReset { deadline: Instant },
    Backoff { until: Instant },
    Settle { until: Instant },
    CheckRetry,
    SoftReset(Exchange),
    AwaitReset { deadline: Instant },
    QueryVersion(Exchange),
    QueryStackUp(Exchange),
    CheckJoining,
    EnablePcap(Exchange),
    Fetch { index: usize, exchange: Option<Exchange> },
    Replay { index: usize, exchange: Option<Exchange> },
    Failed { status: SpinelStatus },
    ErrorSleep { until: Instant },
    Finish,
    Done,
}

#[derive(Debug)]
pub(crate) struct InitProcess {
    step: InitStep,
}

impl InitProcess {
    pub(crate) fn new() -> Self {
        Self {
            step: InitStep::Start,
        }
    }

    pub(crate) fn poll(&mut self, ctx: &mut NcpContext, event: &NcpEvent, now: Instant) -> Poll<()> {
        if event.is_reset() {
            match ctx.driver_state {
                DriverState::Initializing => {
                    error!("unexpected reset during ncp initialization");
                    ctx.failure_count += 1;
                    self.step = InitStep::Start;
                }
                DriverState::InitializingWaitingForReset => {
                    ctx.driver_state = DriverState::Initializing;
                }
                DriverState::NormalOperation => {}
            }
        }

        loop {
            match std::mem::replace(&mut self.step, InitStep::Done) {
                InitStep::Start => {
                    if ctx.state == NcpState::Upgrading {
                        self.step = InitStep::AwaitUpgrade;
                    } else if ctx.state == NcpState::Fault {
                        return Poll::Ready(());
                    } else {
                        self.step = InitStep::Begin;
                    }
                }

                InitStep::AwaitUpgrade => {
                    match ctx.device.upgrade_status() {
                        UpgradeStatus::InProgress => {
                            self.step = InitStep::AwaitUpgrade;
                            ctx.schedule(now + UPGRADE_POLL);
                            return Poll::Pending;
                        }
                        UpgradeStatus::Failed(code) => {
                            error!("firmware update failed with error {code}");
                            ctx.failure_count += 1;
                            if ctx.failure_count > ctx.failure_threshold {
                                ctx.enter_fault();
                            }
                        }
                        UpgradeStatus::Idle | UpgradeStatus::Complete => {
                            info!("firmware update complete");
                        }
                    }
                    if ctx.state == NcpState::Fault {
                        return Poll::Ready(());
                    }
                    self.step = InitStep::Begin;
                }

                InitStep::Begin => {
                    info!("initializing ncp");
                    ctx.initializing = true;
                    ctx.change_state(NcpState::Uninitialized);
                    ctx.device.set_power(true);
                    ctx.props.reset(&ctx.defaults);
                    ctx.driver_state = DriverState::InitializingWaitingForReset;

                    if ctx.flags.contains(NcpFlags::RESET_EXPECTED) {
                        self.step = InitStep::AwaitExpectedReset {
                            deadline: now + ctx.timeouts.response,
                        };
                    } else {
                        let delay = ctx.backoff.delay_for_unexpected_reset_at(now);
                        if !delay.is_zero() {
                            warn!("ncp reset loop suspected; delaying init by {delay:?}");
                        }
                        return self.sleep(ctx, now + delay, |until| InitStep::Backoff { until });
                    }
                }

                InitStep::AwaitExpectedReset { deadline } => {
                    let cleared = !ctx.flags.contains(NcpFlags::RESET_EXPECTED);
                    match wait_within(ctx, cleared, deadline, now) {
                        Wait::Pending => {
                            self.step = InitStep::AwaitExpectedReset { deadline };
                            return Poll::Pending;
                        }
                        Wait::TimedOut => {
                            ctx.failure_count += 1;
                            ctx.flags.remove(NcpFlags::RESET_EXPECTED);
                            error!("was waiting for a reset, but never got one");
                        }
                        Wait::Met => {}
                    }
                    return self.settle(ctx, now);
                }

                InitStep::Backoff { until } => {
                    if now < until {
                        return self.sleep(ctx, until, |until| InitStep::Backoff { until });
                    }
                    return self.settle(ctx, now);
                }

                InitStep::Settle { until } => {
                    if now < until {
                        return self.sleep(ctx, until, |until| InitStep::Settle { until });
                    }
                    self.step = InitStep::CheckRetry;
                }

                InitStep::CheckRetry => {
                    if let Some(poll) = self.check_retry(ctx, event, now) {
                        return poll;
                    }
                }

                InitStep::SoftReset(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = InitStep::SoftReset(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(_)) => self.await_reset(ctx, now),
                    Poll::Ready(Err(e)) => self.fail(e),
                },

                InitStep::AwaitReset { deadline } => {
                    match wait_within(ctx, event.is_reset(), deadline, now) {
                        Wait::Pending => {
                            self.step = InitStep::AwaitReset { deadline };
                            return Poll::Pending;
                        }
                        Wait::TimedOut => {
                            warn!("no reset notification from ncp");
                            self.fail(NcpError::Timeout(ctx.timeouts.reset_response));
                        }
                        Wait::Met => self.begin_queries(ctx),
                    }
                }

                InitStep::QueryVersion(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = InitStep::QueryVersion(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(result) => match result.and_then(|r| r.into_result()) {
                        Ok(_) if ctx.state == NcpState::Uninitialized => {
                            let command = SpinelCommand::get(Property::NetStackUp);
                            self.step = InitStep::QueryStackUp(Exchange::new(&command));
                        }
                        Ok(_) => self.step = InitStep::CheckJoining,
                        Err(e) => self.fail(e),
                    },
                },

                InitStep::QueryStackUp(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = InitStep::QueryStackUp(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(_)) if ctx.state == NcpState::Uninitialized => {
                        self.fail(NcpError::Other("stack state still unknown".into()));
                    }
                    Poll::Ready(Ok(_)) => self.step = InitStep::CheckJoining,
                    Poll::Ready(Err(e)) => self.fail(e),
                },

                InitStep::CheckJoining => {
                    if ctx.state.is_joining() {
                        self.fail(NcpError::Other(format!("ncp is {}, starting over", ctx.state)));
                    } else if ctx.flags.contains(NcpFlags::PCAP_IN_PROGRESS) {
                        let command = SpinelCommand::set_bool(Property::MacRawStreamEnabled, true);
                        self.step = InitStep::EnablePcap(Exchange::new(&command));
                    } else {
                        self.after_mandatory(ctx);
                    }
                }

                InitStep::EnablePcap(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = InitStep::EnablePcap(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(_)) => self.after_mandatory(ctx),
                    Poll::Ready(Err(e)) => self.fail(e),
                },

                InitStep::Fetch { index, exchange } => {
                    if let Some(poll) = self.fetch(ctx, event, now, index, exchange) {
                        return poll;
                    }
                }

                InitStep::Replay { index, exchange } => {
                    if let Some(poll) = self.replay(ctx, event, now, index, exchange) {
                        return poll;
                    }
                }

                InitStep::Failed { status } => {
                    if !status.is_ok() {
                        error!("initialization error: {status}");
                    }
                    return self.sleep(ctx, now + ERROR_DELAY, |until| InitStep::ErrorSleep {
                        until,
                    });
                }

                InitStep::ErrorSleep { until } => {
                    if now < until {
                        return self.sleep(ctx, until, |until| InitStep::ErrorSleep { until });
                    }
                    ctx.failure_count += 1;
                    return self.settle(ctx, now);
                }

                InitStep::Finish => {
                    ctx.flags.remove(NcpFlags::INIT_TRANSIENT);
                    ctx.failure_count = 0;
                    ctx.initializing = false;
                    ctx.driver_state = DriverState::NormalOperation;
                    info!("finished initializing ncp");
                    return Poll::Ready(());
                }

                InitStep::Done => return Poll::Ready(()),
            }
        }
    }

    // ── Steps ────────────────────────────────────────────────────

    /// Top of the retry loop. `None` means continue with the next step.
    fn check_retry(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
    ) -> Option<Poll<()>> {
        if ctx.failure_count > ctx.failure_threshold {
            error!(
                "ALERT: ncp is misbehaving: repeatedly unable to initialize, entering fault state"
            );
            ctx.enter_fault();
            return Some(Poll::Ready(()));
        }

        if ctx.flags.contains(NcpFlags::AUTO_UPDATE_FIRMWARE)
            && ctx.failure_count >= ctx.failure_threshold
            && ctx.device.can_upgrade_firmware()
        {
            error!("ALERT: ncp is misbehaving: attempting a firmware update");
            ctx.device.upgrade_firmware();
            ctx.change_state(NcpState::Upgrading);
            self.step = InitStep::Start;
            ctx.schedule(now);
            return Some(Poll::Pending);
        }

        if !event.is_reset() && ctx.failure_count > 0 {
            error!("resetting and trying again (retry {})", ctx.failure_count);
            ctx.change_state(NcpState::Uninitialized);
            ctx.network_key = Bytes::new();
            ctx.network_key_index = 0;
            ctx.reset_tasks(TaskError::Canceled);

            if ctx.failure_count % 2 == 0 {
                info!("hard resetting ncp");
                ctx.device.hard_reset();
                self.await_reset(ctx, now);
            } else {
                info!("soft resetting ncp");
                self.step = InitStep::SoftReset(Exchange::without_response(&SpinelCommand::reset()));
            }
            return None;
        }

        self.begin_queries(ctx);
        None
    }

    fn await_reset(&mut self, ctx: &mut NcpContext, now: Instant) {
        ctx.driver_state = DriverState::InitializingWaitingForReset;
        self.step = InitStep::AwaitReset {
            deadline: now + ctx.timeouts.reset_response,
        };
    }

    /// From here on a reset restarts init.
    fn begin_queries(&mut self, ctx: &mut NcpContext) {
        ctx.driver_state = DriverState::Initializing;
        let command = SpinelCommand::get(Property::ProtocolVersion);
        self.step = InitStep::QueryVersion(Exchange::new(&command));
    }

    fn after_mandatory(&mut self, ctx: &NcpContext) {
        self.step = if ctx.is_enabled() {
            InitStep::Fetch {
                index: 0,
                exchange: None,
            }
        } else {
            InitStep::Finish
        };
    }

    fn fetch(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
        mut index: usize,
        mut exchange: Option<Exchange>,
    ) -> Option<Poll<()>> {
        while let Some(&(property, capability)) = FETCH_LIST.get(index) {
            if exchange.is_none() {
                if !ctx.capabilities.satisfies(capability) {
                    debug!("skipping fetch of {property}: capability not advertised");
                    index += 1;
                    continue;
                }
                exchange = Some(Exchange::new(&SpinelCommand::get(property)));
            }

            let Some(active) = exchange.as_mut() else {
                break;
            };
            match active.poll(ctx, event, now) {
                Poll::Pending => {
                    self.step = InitStep::Fetch { index, exchange };
                    return Some(Poll::Pending);
                }
                Poll::Ready(result) => {
                    match result.and_then(|r| r.into_result()) {
                        Ok(_) => {}
                        Err(NcpError::ProtocolStatus(status)) => {
                            warn!("unsuccessful fetching property {property} from ncp: {status}")
                        }
                        Err(e) => warn!("unsuccessful fetching property {property} from ncp: {e}"),
                    }
                    index += 1;
                    exchange = None;
                }
            }
        }

        self.step = InitStep::Replay {
            index: 0,
            exchange: None,
        };
        None
    }

    fn replay(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
        mut index: usize,
        mut exchange: Option<Exchange>,
    ) -> Option<Poll<()>> {
        while let Some((property, entry)) = ctx.settings.entry_at(index) {
            if exchange.is_none() {
                info!("restoring property {property} on ncp");
                if !ctx.capabilities.satisfies(entry.capability) {
                    debug!("skipping restore of {property}: capability not advertised");
                    index += 1;
                    continue;
                }
                if !ctx.transport.fits(entry.command.len()) {
                    warn!(
                        "command restoring {property} does not fit in outbound buffer \
                         ({} bytes, {} available)",
                        entry.command.len() + 1,
                        ctx.transport.capacity()
                    );
                    index += 1;
                    continue;
                }
                exchange = Some(Exchange::raw(entry.command.clone()));
            }

            let Some(active) = exchange.as_mut() else {
                break;
            };
            match active.poll(ctx, event, now) {
                Poll::Pending => {
                    self.step = InitStep::Replay { index, exchange };
                    return Some(Poll::Pending);
                }
                Poll::Ready(result) => {
                    match result.and_then(|r| r.into_result()) {
                        Ok(_) => {}
                        Err(NcpError::ProtocolStatus(status)) => {
                            warn!("unsuccessful in restoring property {property} on ncp: {status}")
                        }
                        Err(e) => warn!("unsuccessful in restoring property {property} on ncp: {e}"),
                    }
                    index += 1;
                    exchange = None;
                }
            }
        }

        self.step = InitStep::Finish;
        None
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn fail(&mut self, e: NcpError) {
        let status = match e {
            NcpError::ProtocolStatus(status) => status,
            other => {
                warn!("init step failed: {other}");
                SpinelStatus::OK
            }
        };
        self.step = InitStep::Failed { status };
    }

    /// Suspend until `until`; always yields at least once.
    fn sleep(
        &mut self,
        ctx: &mut NcpContext,
        until: Instant,
        step: impl FnOnce(Instant) -> InitStep,
    ) -> Poll<()> {
        self.step = step(until);
        ctx.schedule(until);
        Poll::Pending
    }

    fn settle(&mut self, ctx: &mut NcpContext, now: Instant) -> Poll<()> {
        self.sleep(ctx, now + SETTLE_DELAY, |until| InitStep::Settle { until })
    }
}
