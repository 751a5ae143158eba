//! Bring a sleeping NCP back: power on, leave low power, and confirm
//! it answers before declaring it offline-but-awake.

use std::task::Poll;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, warn};

use super::{MCU_POWER_STATE_ON, TaskResponder, TaskStatus, respond};
use crate::context::NcpContext;
use crate::event::NcpEvent;
use crate::spinel::{Capability, Property, SpinelCommand};
use crate::transport::Exchange;

#[derive(Debug)]
enum Step {
    Start,
    PowerState(Exchange),
    Ping(Exchange),
}

#[derive(Debug)]
pub struct WakeTask {
    step: Step,
    pub(super) responder: Option<TaskResponder>,
}

impl WakeTask {
    pub fn new(responder: Option<TaskResponder>) -> Self {
        Self {
            step: Step::Start,
            responder,
        }
    }

    pub(super) fn process_event(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
    ) -> TaskStatus {
        loop {
            match &mut self.step {
                Step::Start => {
                    ctx.device.set_power(true);
                    self.step = if ctx.capabilities.contains(Capability::MCU_POWER_STATE) {
                        let command =
                            SpinelCommand::set_uint(Property::McuPowerState, MCU_POWER_STATE_ON);
                        Step::PowerState(Exchange::new(&command))
                    } else {
                        Step::Ping(Exchange::new(&SpinelCommand::noop()))
                    };
                }
                Step::PowerState(exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => return TaskStatus::Running,
                    Poll::Ready(result) => match result.and_then(|r| r.into_result()) {
                        Ok(_) => self.step = Step::Ping(Exchange::new(&SpinelCommand::noop())),
                        Err(e) => return self.fail(e),
                    },
                },
                Step::Ping(exchange) => match exchange.poll(ctx, event, now) {
                    Poll::Pending => return TaskStatus::Running,
                    Poll::Ready(Ok(_)) => {
                        if ctx.state.is_sleeping() {
                            info!("ncp is awake");
                            ctx.change_state(ctx.offline_state());
                        }
                        respond(self.responder.take(), Ok(Bytes::new()));
                        return TaskStatus::Ended;
                    }
                    Poll::Ready(Err(e)) => return self.fail(e),
                },
            }
        }
    }

    fn fail(&mut self, e: crate::error::NcpError) -> TaskStatus {
        warn!("wake failed: {e}");
        respond(self.responder.take(), Err(e.into()));
        TaskStatus::Ended
    }
}
