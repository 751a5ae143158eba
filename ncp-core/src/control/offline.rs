//! Offline sub-process: an interface-down NCP with auto deep sleep
//! enabled is put to sleep after a quiet period.

use std::task::Poll;
use std::time::Instant;

use tracing::info;

use crate::context::NcpContext;
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::task::Task;

#[derive(Debug)]
enum Step {
    AwaitAutoSleep,
    AwaitAwake,
    AwaitIdle { deadline: Instant },
}

#[derive(Debug)]
pub(crate) struct OfflineProcess {
    step: Step,
}

impl OfflineProcess {
    pub(crate) fn new() -> Self {
        Self {
            step: Step::AwaitAutoSleep,
        }
    }

    pub(crate) fn poll(&mut self, ctx: &mut NcpContext, event: &NcpEvent, now: Instant) -> Poll<()> {
        loop {
            if should_exit(ctx) {
                return Poll::Ready(());
            }
            let auto = ctx.flags.contains(NcpFlags::AUTO_DEEP_SLEEP);

            match self.step {
                Step::AwaitAutoSleep => {
                    if !auto {
                        return Poll::Pending;
                    }
                    self.step = Step::AwaitAwake;
                }

                Step::AwaitAwake => {
                    if auto && ctx.state.is_sleeping() {
                        return Poll::Pending;
                    }
                    self.step = Step::AwaitIdle {
                        deadline: now + ctx.sleep_timeout(),
                    };
                }

                Step::AwaitIdle { deadline } => {
                    if !auto || ctx.state.is_sleeping() {
                        return Poll::Ready(());
                    }
                    // Activity restarts the idle period.
                    if !ctx.tasks.is_empty() || event.is_from_ncp() {
                        let deadline = now + ctx.sleep_timeout();
                        self.step = Step::AwaitIdle { deadline };
                        ctx.schedule(deadline);
                        return Poll::Pending;
                    }
                    if now < deadline {
                        ctx.schedule(deadline);
                        return Poll::Pending;
                    }
                    info!("ncp idle for {:?}; entering deep sleep", ctx.sleep_timeout());
                    ctx.start_task(Task::deep_sleep(None), now);
                    return Poll::Ready(());
                }
            }
        }
    }
}

fn should_exit(ctx: &NcpContext) -> bool {
    ctx.state.is_interface_up() || !ctx.is_enabled() || ctx.transport.has_pending()
}
