//! Associated sub-process: keep an eye on a joined NCP and ping it when
//! it has been quiet for a whole tickle period.

use std::task::Poll;
use std::time::Instant;

use tracing::{debug, error};

use super::{Wait, wait_within};
use crate::context::NcpContext;
use crate::event::NcpEvent;
use crate::spinel::SpinelCommand;
use crate::transport::Exchange;

#[derive(Debug)]
enum Step {
    Start,
    WaitHost { deadline: Instant },
    WaitExit { deadline: Instant },
    Tickle(Exchange),
}

#[derive(Debug)]
pub(crate) struct AssociatedProcess {
    step: Step,
}

impl AssociatedProcess {
    pub(crate) fn new() -> Self {
        Self { step: Step::Start }
    }

    pub(crate) fn poll(&mut self, ctx: &mut NcpContext, event: &NcpEvent, now: Instant) -> Poll<()> {
        loop {
            match std::mem::replace(&mut self.step, Step::Start) {
                Step::Start => {
                    self.step = Step::WaitHost {
                        deadline: now + ctx.timeouts.tickle,
                    };
                }

                Step::WaitHost { deadline } => {
                    let met = should_exit(ctx) || !event.is_from_ncp();
                    if wait_within(ctx, met, deadline, now) == Wait::Pending {
                        self.step = Step::WaitHost { deadline };
                        return Poll::Pending;
                    }
                    // Not the same wait as below; the second one only
                    // ends on an exit condition.
                    self.step = Step::WaitExit {
                        deadline: now + ctx.timeouts.tickle,
                    };
                }

                Step::WaitExit { deadline } => match wait_within(ctx, should_exit(ctx), deadline, now) {
                    Wait::Pending => {
                        self.step = Step::WaitExit { deadline };
                        return Poll::Pending;
                    }
                    Wait::Met => return Poll::Ready(()),
                    Wait::TimedOut => {
                        debug!("tickling associated ncp");
                        self.step = Step::Tickle(Exchange::new(&SpinelCommand::noop()));
                    }
                },

                Step::Tickle(mut exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => {
                        self.step = Step::Tickle(exchange);
                        return Poll::Pending;
                    }
                    Poll::Ready(result) => {
                        match result.and_then(|r| r.into_result()) {
                            Ok(_) => ctx.failure_count = 0,
                            Err(e) => {
                                error!("ncp is misbehaving or unresponsive: {e}");
                                ctx.request_reinit();
                            }
                        }
                        return Poll::Ready(());
                    }
                },
            }
        }
    }
}

fn should_exit(ctx: &NcpContext) -> bool {
    !ctx.is_enabled() || !ctx.state.is_joining_or_joined()
}
