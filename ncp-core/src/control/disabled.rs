//! Disabled sub-process: park the NCP in deep sleep while the driver is
//! administratively off, and tickle it now and then to catch a wedged
//! radio.

use std::task::Poll;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{Wait, wait_within};
use crate::context::NcpContext;
use crate::error::TaskError;
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::spinel::SpinelCommand;
use crate::state::NcpState;
use crate::task::Task;
use crate::transport::Exchange;

#[derive(Debug)]
enum Step {
    Top,
    WaitIdle { deadline: Instant },
    AwaitSleep { deadline: Instant },
    AwaitHostEvent,
    AwaitWake { deadline: Instant },
    Tickle(Exchange),
    AwaitTickleReset { deadline: Instant },
    Finish,
}

#[derive(Debug)]
pub(crate) struct DisabledProcess {
    step: Step,
}

impl DisabledProcess {
    pub(crate) fn new() -> Self {
        Self { step: Step::Top }
    }

    pub(crate) fn poll(&mut self, ctx: &mut NcpContext, event: &NcpEvent, now: Instant) -> Poll<()> {
        loop {
            match std::mem::replace(&mut self.step, Step::Top) {
                Step::Top => {
                    if ctx.is_enabled() {
                        self.step = Step::Finish;
                    } else if ctx.state == NcpState::Uninitialized {
                        info!("ncp is uninitialized; not putting it to sleep");
                        return Poll::Ready(());
                    } else {
                        self.step = Step::WaitIdle {
                            deadline: now + ctx.timeouts.response,
                        };
                    }
                }

                Step::WaitIdle { deadline } => {
                    let idle = ctx.is_enabled() || !ctx.is_busy(now);
                    if wait_within(ctx, idle, deadline, now) == Wait::Pending {
                        self.step = Step::WaitIdle { deadline };
                        return Poll::Pending;
                    }
                    if ctx.is_enabled() {
                        self.step = Step::Finish;
                        continue;
                    }
                    if ctx.initializing {
                        warn!("ncp still initializing; leaving disabled mode for now");
                        return Poll::Ready(());
                    }

                    ctx.reset_tasks(TaskError::Canceled);
                    if ctx.state.is_sleeping() || ctx.state == NcpState::Fault {
                        if let Some(poll) = self.check_sleep(ctx) {
                            return poll;
                        }
                    } else {
                        ctx.start_task(Task::deep_sleep(None), now);
                        self.step = Step::AwaitSleep {
                            deadline: now + ctx.timeouts.response,
                        };
                    }
                }

                Step::AwaitSleep { deadline } => {
                    let settled = ctx.state == NcpState::DeepSleep || ctx.tasks.is_empty();
                    if wait_within(ctx, settled, deadline, now) == Wait::Pending {
                        self.step = Step::AwaitSleep { deadline };
                        return Poll::Pending;
                    }
                    if let Some(poll) = self.check_sleep(ctx) {
                        return poll;
                    }
                }

                Step::AwaitHostEvent => {
                    if event.is_from_ncp() {
                        self.step = Step::AwaitHostEvent;
                        return Poll::Pending;
                    }
                    self.step = Step::AwaitWake {
                        deadline: now + ctx.timeouts.deep_sleep_tickle,
                    };
                }

                Step::AwaitWake { deadline } => {
                    let woken = ctx.state != NcpState::DeepSleep
                        || ctx.is_enabled()
                        || event.is_from_ncp();
                    match wait_within(ctx, woken, deadline, now) {
                        Wait::Pending => {
                            self.step = Step::AwaitWake { deadline };
                            return Poll::Pending;
                        }
                        Wait::Met => self.step = Step::Top,
                        Wait::TimedOut => {
                            warn!("tickling sleeping ncp");
                            self.step =
                                Step::Tickle(Exchange::without_response(&SpinelCommand::reset()));
                        }
                    }
                }

                Step::Tickle(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = Step::Tickle(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(_)) => {
                        ctx.flags.insert(NcpFlags::RESET_EXPECTED);
                        self.step = Step::AwaitTickleReset {
                            deadline: now + ctx.timeouts.response,
                        };
                    }
                    Poll::Ready(Err(e)) => {
                        error!("unable to tickle ncp: {e}");
                        return Poll::Ready(());
                    }
                },

                Step::AwaitTickleReset { deadline } => {
                    let reset = !ctx.flags.contains(NcpFlags::RESET_EXPECTED);
                    match wait_within(ctx, reset, deadline, now) {
                        Wait::Pending => {
                            self.step = Step::AwaitTickleReset { deadline };
                            return Poll::Pending;
                        }
                        Wait::Met => self.step = Step::Top,
                        Wait::TimedOut => {
                            error!("ncp did not reset after tickle");
                            return Poll::Ready(());
                        }
                    }
                }

                Step::Finish => {
                    ctx.device.set_power(true);
                    if ctx.state.is_sleeping() {
                        ctx.start_task(Task::wake(None), now);
                    }
                    return Poll::Ready(());
                }
            }
        }
    }

    /// After asking for deep sleep: either wait for host activity or give
    /// up on the link.
    fn check_sleep(&mut self, ctx: &mut NcpContext) -> Option<Poll<()>> {
        if ctx.state.is_sleeping() {
            self.step = Step::AwaitHostEvent;
            return None;
        }
        if !ctx.initializing {
            warn!("ncp did not enter deep sleep; resetting it");
            ctx.device.hard_reset();
            ctx.flags.insert(NcpFlags::RESET_EXPECTED);
            ctx.change_state(NcpState::Uninitialized);
        }
        Some(Poll::Ready(()))
    }
}
