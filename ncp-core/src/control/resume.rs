//! Resume sub-process: bring a commissioned network back up after init.

use std::task::Poll;
use std::time::Instant;

use tracing::{error, info};

use crate::context::NcpContext;
use crate::error::NcpError;
use crate::event::NcpEvent;
use crate::flags::NcpFlags;
use crate::spinel::{Property, SpinelCommand};
use crate::transport::{Exchange, Reply};

#[derive(Debug)]
enum Step {
    Start,
    InterfaceUp(Exchange),
    StackUp(Exchange),
}

#[derive(Debug)]
pub(crate) struct ResumeProcess {
    step: Step,
}

impl ResumeProcess {
    pub(crate) fn new() -> Self {
        Self { step: Step::Start }
    }

    pub(crate) fn poll(&mut self, ctx: &mut NcpContext, event: &NcpEvent, now: Instant) -> Poll<()> {
        loop {
            match &mut self.step {
                Step::Start => {
                    if !ctx.flags.contains(NcpFlags::COMMISSIONED) {
                        info!("not commissioned; nothing to resume");
                        return Poll::Ready(());
                    }
                    let command = SpinelCommand::set_bool(Property::NetIfUp, true);
                    self.step = Step::InterfaceUp(Exchange::new(&command));
                }
                Step::InterfaceUp(exchange) => match ready(exchange.poll(ctx, event, now)) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(())) => {
                        let command = SpinelCommand::set_bool(Property::NetStackUp, true);
                        self.step = Step::StackUp(Exchange::new(&command));
                    }
                    Poll::Ready(Err(e)) => return fail(ctx, e),
                },
                Step::StackUp(exchange) => match ready(exchange.poll(ctx, event, now)) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(())) => {
                        info!("resumed network");
                        return Poll::Ready(());
                    }
                    Poll::Ready(Err(e)) => return fail(ctx, e),
                },
            }
        }
    }
}

/// Fold a non-zero reply status into the error path.
fn ready(poll: Poll<Result<Reply, NcpError>>) -> Poll<Result<(), NcpError>> {
    poll.map(|result| result.and_then(|r| r.into_result()).map(|_| ()))
}

fn fail(ctx: &mut NcpContext, e: NcpError) -> Poll<()> {
    error!("failed to resume network: {e}");
    ctx.request_reinit();
    Poll::Ready(())
}
