//! Command transport: the single outbound frame slot.
//!
//! ```text
//!   load ──► pending ──take_pending──► awaiting ──reply/reset──► clear
//!              (one frame)   (link)      (one tid)
//! ```
//!
//! At most one frame waits to be written and at most one written frame
//! waits for its reply. `load` refuses to overwrite a pending frame, and
//! callers wait for [`CommandTransport::is_clear_to_send`] before loading
//! so a second command is never issued while one is in flight.

use std::task::Poll;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::context::NcpContext;
use crate::error::NcpError;
use crate::event::NcpEvent;
use crate::spinel::{Header, SpinelCommand, SpinelFrame, SpinelStatus};

// ── OutboundFrame ────────────────────────────────────────────────

/// A fully encoded frame (header + body) waiting for the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    header: Header,
    bytes: Bytes,
}

impl OutboundFrame {
    pub fn header(&self) -> Header {
        self.header
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    header: Header,
    expires: Instant,
}

// ── CommandTransport ─────────────────────────────────────────────

#[derive(Debug)]
pub struct CommandTransport {
    capacity: usize,
    pending: Option<OutboundFrame>,
    awaiting: Option<InFlight>,
    next_tid: u8,
    response_timeout: Duration,
}

impl CommandTransport {
    pub fn new(capacity: usize, response_timeout: Duration) -> Self {
        Self {
            capacity,
            pending: None,
            awaiting: None,
            next_tid: 1,
            response_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a body of `len` bytes fits the buffer with its header.
    pub fn fits(&self, len: usize) -> bool {
        len + 1 <= self.capacity
    }

    /// Nothing pending and nothing awaiting a reply. An await older than
    /// the response timeout counts as abandoned.
    pub fn is_clear_to_send(&self, now: Instant) -> bool {
        self.pending.is_none() && self.awaiting.is_none_or(|a| now >= a.expires)
    }

    /// A frame is loaded but not yet written.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Load an encoded command body. Fails without side effects when a
    /// frame is already pending or the body does not fit.
    pub fn load(&mut self, body: &[u8]) -> Result<Header, NcpError> {
        if self.pending.is_some() {
            return Err(NcpError::TransportBusy);
        }
        if !self.fits(body.len()) {
            return Err(NcpError::BufferTooSmall {
                size: body.len() + 1,
                max: self.capacity,
            });
        }

        let header = Header::new(0, self.next_tid);
        self.next_tid = if self.next_tid >= 15 { 1 } else { self.next_tid + 1 };

        let mut buf = BytesMut::with_capacity(body.len() + 1);
        buf.put_u8(header.as_byte());
        buf.extend_from_slice(body);
        self.pending = Some(OutboundFrame {
            header,
            bytes: buf.freeze(),
        });
        Ok(header)
    }

    /// Encode and load a structured command.
    pub fn pack(&mut self, command: &SpinelCommand) -> Result<Header, NcpError> {
        let len = command.body_len();
        if !self.fits(len) {
            return Err(NcpError::BufferTooSmall {
                size: len + 1,
                max: self.capacity,
            });
        }
        let header = self.load(&command.encode_body())?;
        debug!(tid = header.tid(), "tx {command}");
        Ok(header)
    }

    /// Hand the pending frame to the link. The frame is then in flight
    /// until its reply arrives or the response timeout passes.
    pub fn take_pending(&mut self, now: Instant) -> Option<Bytes> {
        let frame = self.pending.take()?;
        self.awaiting = Some(InFlight {
            header: frame.header,
            expires: now + self.response_timeout,
        });
        trace!(tid = frame.header.tid(), len = frame.bytes.len(), "flushed");
        Some(frame.bytes)
    }

    /// The frame with `header` is loaded but not yet written.
    pub fn is_pending(&self, header: Header) -> bool {
        self.pending.as_ref().is_some_and(|f| f.header == header)
    }

    /// The frame with `header` was written and has no reply yet.
    pub fn is_awaiting(&self, header: Header) -> bool {
        self.awaiting.is_some_and(|a| a.header == header)
    }

    /// Forget the frame with `header`, written or not.
    pub fn release(&mut self, header: Header) {
        if self.is_pending(header) {
            self.pending = None;
        }
        if self.is_awaiting(header) {
            self.awaiting = None;
        }
    }

    /// Track replies and resets arriving from the NCP.
    pub fn observe(&mut self, event: &NcpEvent) {
        match event {
            NcpEvent::Frame(frame) => {
                if self.is_awaiting(frame.header) {
                    self.awaiting = None;
                }
            }
            NcpEvent::Reset(_) => self.awaiting = None,
            NcpEvent::Tick => {}
        }
    }

    /// The status carried by a reply, `OK` unless it is a `LAST_STATUS`.
    pub fn peek_response_status(event: &NcpEvent) -> SpinelStatus {
        event
            .frame()
            .and_then(SpinelFrame::status)
            .unwrap_or(SpinelStatus::OK)
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.awaiting = None;
    }
}

// ── Exchange ─────────────────────────────────────────────────────

/// Outcome of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: SpinelStatus,
    /// The reply frame; `None` for commands sent without waiting.
    pub frame: Option<SpinelFrame>,
}

impl Reply {
    /// Turn a non-zero status into an error.
    pub fn into_result(self) -> Result<Self, NcpError> {
        if self.status.is_ok() {
            Ok(self)
        } else {
            Err(NcpError::ProtocolStatus(self.status))
        }
    }

    /// Value bytes of the reply frame.
    pub fn value(&self) -> Bytes {
        self.frame
            .as_ref()
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeStep {
    Start,
    Prepare { deadline: Instant },
    Flush { deadline: Instant, header: Header },
    Response { deadline: Instant, header: Header },
    Done,
}

/// One command exchange: prepare, pack, flush, await, peek.
///
/// Each wait has its own deadline so a stall is attributed to the step
/// where it happened. The in-flight marker is released on completion
/// and on timeout.
#[derive(Debug, Clone)]
pub struct Exchange {
    body: Bytes,
    await_response: bool,
    step: ExchangeStep,
}

impl Exchange {
    pub fn new(command: &SpinelCommand) -> Self {
        Self::raw(command.encode_body())
    }

    /// Exchange a pre-encoded command body.
    pub fn raw(body: Bytes) -> Self {
        Self {
            body,
            await_response: true,
            step: ExchangeStep::Start,
        }
    }

    /// Complete once the frame is written (used for `RESET`).
    pub fn without_response(command: &SpinelCommand) -> Self {
        Self {
            await_response: false,
            ..Self::new(command)
        }
    }

    pub fn poll(
        &mut self,
        ctx: &mut NcpContext,
        event: &NcpEvent,
        now: Instant,
    ) -> Poll<Result<Reply, NcpError>> {
        loop {
            match self.step {
                ExchangeStep::Start => {
                    self.step = ExchangeStep::Prepare {
                        deadline: now + ctx.timeouts.send,
                    };
                }
                ExchangeStep::Prepare { deadline } => {
                    if !ctx.transport.is_clear_to_send(now) {
                        if now >= deadline {
                            self.step = ExchangeStep::Done;
                            return Poll::Ready(Err(NcpError::Timeout(ctx.timeouts.send)));
                        }
                        ctx.schedule(deadline);
                        return Poll::Pending;
                    }
                    let header = match ctx.transport.load(&self.body) {
                        Ok(header) => header,
                        Err(e) => {
                            self.step = ExchangeStep::Done;
                            return Poll::Ready(Err(e));
                        }
                    };
                    trace!(tid = header.tid(), "loaded");
                    self.step = ExchangeStep::Flush {
                        deadline: now + ctx.timeouts.send,
                        header,
                    };
                }
                ExchangeStep::Flush { deadline, header } => {
                    if ctx.transport.is_pending(header) {
                        if now >= deadline {
                            ctx.transport.release(header);
                            self.step = ExchangeStep::Done;
                            return Poll::Ready(Err(NcpError::Timeout(ctx.timeouts.send)));
                        }
                        ctx.schedule(deadline);
                        return Poll::Pending;
                    }
                    if !self.await_response {
                        ctx.transport.release(header);
                        self.step = ExchangeStep::Done;
                        return Poll::Ready(Ok(Reply {
                            status: SpinelStatus::OK,
                            frame: None,
                        }));
                    }
                    self.step = ExchangeStep::Response {
                        deadline: now + ctx.timeouts.response,
                        header,
                    };
                }
                ExchangeStep::Response { deadline, header } => {
                    if let Some(frame) = event.frame().filter(|f| f.header == header) {
                        ctx.transport.release(header);
                        self.step = ExchangeStep::Done;
                        return Poll::Ready(Ok(Reply {
                            status: CommandTransport::peek_response_status(event),
                            frame: Some(frame.clone()),
                        }));
                    }
                    if now >= deadline {
                        ctx.transport.release(header);
                        self.step = ExchangeStep::Done;
                        return Poll::Ready(Err(NcpError::Timeout(ctx.timeouts.response)));
                    }
                    ctx.schedule(deadline);
                    return Poll::Pending;
                }
                ExchangeStep::Done => {
                    return Poll::Ready(Err(NcpError::Other(
                        "exchange polled after completion".into(),
                    )));
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
