//! Put the NCP into deep sleep.
//!
//! NCPs advertising `MCU_POWER_STATE` are asked to enter low power;
//! others are powered off through the device hooks.

use std::task::Poll;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, warn};

use super::{MCU_POWER_STATE_LOW_POWER, TaskResponder, TaskStatus, respond};
use crate::context::NcpContext;
use crate::error::TaskError;
use crate::event::NcpEvent;
use crate::spinel::{Capability, Property, SpinelCommand};
use crate::state::NcpState;
use crate::transport::Exchange;

#[derive(Debug)]
enum Step {
    Start,
    LowPower(Exchange),
}

#[derive(Debug)]
pub struct DeepSleepTask {
    step: Step,
    pub(super) responder: Option<TaskResponder>,
}

impl DeepSleepTask {
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
        match &mut self.step {
            Step::Start => {
                if ctx.state.is_sleeping() {
                    respond(self.responder.take(), Ok(Bytes::new()));
                    return TaskStatus::Exited;
                }
                if ctx.state == NcpState::Fault || ctx.state.is_initializing() {
                    respond(
                        self.responder.take(),
                        Err(TaskError::InvalidState(ctx.state)),
                    );
                    return TaskStatus::Exited;
                }
                if !ctx.capabilities.contains(Capability::MCU_POWER_STATE) {
                    ctx.device.set_power(false);
                    return self.enter_deep_sleep(ctx);
                }
                let command =
                    SpinelCommand::set_uint(Property::McuPowerState, MCU_POWER_STATE_LOW_POWER);
                self.step = Step::LowPower(Exchange::new(&command));
                self.process_event(ctx, event, now)
            }
            Step::LowPower(exchange) => match exchange.poll(ctx, event, now) {
                Poll::Pending => TaskStatus::Running,
                Poll::Ready(result) => match result.and_then(|r| r.into_result()) {
                    Ok(_) => self.enter_deep_sleep(ctx),
                    Err(e) => {
                        warn!("deep sleep failed: {e}");
                        respond(self.responder.take(), Err(e.into()));
                        TaskStatus::Ended
                    }
                },
            },
        }
    }

    fn enter_deep_sleep(&mut self, ctx: &mut NcpContext) -> TaskStatus {
        info!("ncp entering deep sleep");
        ctx.change_state(NcpState::DeepSleep);
        respond(self.responder.take(), Ok(Bytes::new()));
        TaskStatus::Ended
    }
}
