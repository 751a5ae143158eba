//! Generic one-command task: property get/set, noop, and friends.

use std::task::Poll;
use std::time::Instant;

use tracing::{debug, warn};

use super::{TaskResponder, TaskStatus, respond};
use crate::context::NcpContext;
use crate::event::NcpEvent;
use crate::spinel::SpinelCommand;
use crate::transport::Exchange;

#[derive(Debug)]
pub struct SendCommandTask {
    command: SpinelCommand,
    exchange: Option<Exchange>,
    pub(super) responder: Option<TaskResponder>,
}

impl SendCommandTask {
    pub fn new(command: SpinelCommand, responder: Option<TaskResponder>) -> Self {
        Self {
            command,
            exchange: None,
            responder,
        }
    }

    pub(super) fn process_event(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
    ) -> TaskStatus {
        let exchange = self
            .exchange
            .get_or_insert_with(|| Exchange::new(&self.command));

        let result = match exchange.poll(ctx, event, now) {
            Poll::Pending => return TaskStatus::Running,
            Poll::Ready(result) => result.and_then(|reply| reply.into_result()),
        };

        match result {
            Ok(reply) => {
                if let Some(capability) = self
                    .command
                    .property
                    .and_then(|p| p.restore_capability())
                {
                    if ctx.settings.remember(&self.command, capability) {
                        debug!("remembered {}", self.command);
                    }
                }
                respond(self.responder.take(), Ok(reply.value()));
            }
            Err(e) => {
                warn!("{} failed: {e}", self.command);
                respond(self.responder.take(), Err(e.into()));
            }
        }
        TaskStatus::Ended
    }
}
