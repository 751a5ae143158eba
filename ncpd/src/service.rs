//! NCP link service.
//!
//! Connects to the NCP socket and drives an [`NcpInstance`] from a
//! single select loop: inbound frames, the core's next deadline, an
//! idle heartbeat, and the stop flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, trace, warn};

use ncp_core::{HdlcCodec, NcpError, NcpEvent, NcpInstance};

use crate::config::DaemonConfig;
use crate::device::SocketDevice;

// ── NcpService ───────────────────────────────────────────────────

/// The top-level daemon service.
pub struct NcpService {
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl NcpService {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the service until stopped or the link closes.
    ///
    /// 1. Connects to the NCP socket and frames it with [`HdlcCodec`].
    /// 2. Writes every frame the core has queued, reporting each flush
    ///    with a `Tick` before anything is read.
    /// 3. Waits for an inbound frame, the core's deadline, or the idle
    ///    heartbeat, and feeds the result back to the core.
    pub async fn run(&self) -> Result<(), NcpError> {
        self.running.store(true, Ordering::SeqCst);

        let addr = &self.config.link.socket;
        let stream = TcpStream::connect(addr).await?;
        info!("connected to ncp at {addr}");

        let mut link = Framed::new(stream, HdlcCodec::new());
        let mut ncp = NcpInstance::new(&self.config.ncp, Box::new(SocketDevice));
        let idle = Duration::from_millis(self.config.link.idle_tick_ms.max(1));
        let mut wakeup = ncp.handle_event(NcpEvent::Tick, Instant::now());

        while self.running.load(Ordering::SeqCst) {
            while let Some(bytes) = ncp.take_outbound(Instant::now()) {
                trace!(len = bytes.len(), "writing frame");
                link.send(bytes).await?;
                wakeup = ncp.handle_event(NcpEvent::Tick, Instant::now());
            }

            let sleep = wakeup.map_or(idle, |at| {
                at.saturating_duration_since(Instant::now()).min(idle)
            });

            let event = tokio::select! {
                inbound = link.next() => match inbound {
                    Some(Ok(frame)) => NcpEvent::from_frame(frame),
                    Some(Err(e)) => {
                        warn!("ncp link error: {e}");
                        self.running.store(false, Ordering::SeqCst);
                        return Err(e);
                    }
                    None => {
                        warn!("ncp link closed");
                        break;
                    }
                },
                _ = tokio::time::sleep(sleep) => NcpEvent::Tick,
                _ = Self::wait_for_stop(&self.running) => break,
            };
            wakeup = ncp.handle_event(event, Instant::now());
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            state = %ncp.state(),
            dropped = link.codec().dropped(),
            "ncp service stopped"
        );
        Ok(())
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
