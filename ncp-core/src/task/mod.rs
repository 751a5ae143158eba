//! Queued NCP tasks.
//!
//! A task is a small resumable process that owns one user-visible
//! operation. The control state machine hands every event to the task
//! at the front of the queue before running its own sub-processes;
//! finished tasks are popped and the same event cascades to the next.

mod deep_sleep;
mod send_command;
mod wake;

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::context::NcpContext;
use crate::error::{NcpError, TaskError};
use crate::event::NcpEvent;
use crate::spinel::SpinelCommand;

pub use deep_sleep::DeepSleepTask;
pub use send_command::SendCommandTask;
pub use wake::WakeTask;

/// `MCU_POWER_STATE` values.
pub(crate) const MCU_POWER_STATE_LOW_POWER: u32 = 0;
pub(crate) const MCU_POWER_STATE_ON: u32 = 1;

/// Result delivered to whoever started a task.
pub type TaskResult = Result<Bytes, TaskError>;
pub type TaskResponder = oneshot::Sender<TaskResult>;

/// What a task reports after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Suspended; keep it at the front of the queue.
    Running,
    /// Ran to completion.
    Ended,
    /// Left early without doing its work.
    Exited,
}

// ── Task ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Task {
    SendCommand(SendCommandTask),
    DeepSleep(DeepSleepTask),
    Wake(WakeTask),
}

impl Task {
    pub fn send_command(command: SpinelCommand, responder: Option<TaskResponder>) -> Self {
        Task::SendCommand(SendCommandTask::new(command, responder))
    }

    pub fn deep_sleep(responder: Option<TaskResponder>) -> Self {
        Task::DeepSleep(DeepSleepTask::new(responder))
    }

    pub fn wake(responder: Option<TaskResponder>) -> Self {
        Task::Wake(WakeTask::new(responder))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Task::SendCommand(_) => "send-command",
            Task::DeepSleep(_) => "deep-sleep",
            Task::Wake(_) => "wake",
        }
    }

    pub(crate) fn process_event(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
    ) -> TaskStatus {
        match self {
            Task::SendCommand(t) => t.process_event(ctx, event, now),
            Task::DeepSleep(t) => t.process_event(ctx, event, now),
            Task::Wake(t) => t.process_event(ctx, event, now),
        }
    }

    /// Deliver `result` to the caller. Later calls are ignored.
    pub(crate) fn finish(&mut self, result: TaskResult) {
        let responder = match self {
            Task::SendCommand(t) => t.responder.take(),
            Task::DeepSleep(t) => t.responder.take(),
            Task::Wake(t) => t.responder.take(),
        };
        respond(responder, result);
    }
}

pub(crate) fn respond(responder: Option<TaskResponder>, result: TaskResult) {
    if let Some(tx) = responder {
        // The caller may have stopped listening.
        let _ = tx.send(result);
    }
}

/// Wait for the result of a task started by a host request.
pub async fn await_task(rx: oneshot::Receiver<TaskResult>) -> Result<Bytes, NcpError> {
    Ok(rx.await??)
}

// ── TaskQueue ────────────────────────────────────────────────────

/// FIFO of pending tasks. The front task is the current one.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Return a suspended task to the head of the queue.
    pub fn push_front(&mut self, task: Task) {
        self.queue.push_front(task);
    }

    pub fn pop_front(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&Task> {
        self.queue.front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Task> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
