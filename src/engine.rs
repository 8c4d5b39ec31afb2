//! The bus master engine.
//!
//! [`Master`] owns the serial stream, the frame scanner, the transmit
//! queue and the slave registry, and drives them from a single event
//! loop. Every action is a reaction to one of two things: bytes becoming
//! readable on the TTY, or a timer firing. The loop runs on one task, so
//! no state is shared and no locks exist anywhere in the core.
//!
//! Transaction lifecycle:
//! ```text
//! Idle ──enqueue──► Queued ──transmit──► InFlight ──reply───► Completed
//!                                           │
//!                                           └──deadline─────► TimedOut
//! ```
//! The head of the transmit queue *is* the outstanding request; a received
//! frame is attributed to it positionally, never by its contents. On
//! completion the engine holds the line silent for an interframe gap
//! before the next transmit. On timeout no bus traffic happened, so the
//! next head goes out immediately.
//!
//! Two periodic schedulers feed the queue: a probe sweep that discovers
//! disconnected slaves, and a work sweep that collects application
//! requests from the devices. Both run for the life of the process.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant};
use tracing::{debug, error, trace, warn};

use crate::error::BusError;
use crate::protocol::{self, FrameScanner, OP_PROBE_REPLY, OP_PROBE_REQUEST};
use crate::queue::TransmitQueue;
use crate::registry::SlaveRegistry;

/// How long a slave gets to answer a transmitted request.
///
/// Covers the worst-case round trip for a full frame at 9600 baud plus
/// the slave's turnaround.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);

/// Minimum silent-line interval between a reply and the next request.
///
/// 3.5 character times at 9600 baud is about 3.6 ms. Round up.
pub const INTERFRAME_GAP: Duration = Duration::from_millis(4);

/// Period of the probe sweep over disconnected slaves.
pub const PROBE_PERIOD: Duration = Duration::from_secs(2);

/// Nominal period of the device work sweep.
pub const WORK_PERIOD: Duration = Duration::from_millis(500);

/// Work sweep retry delay while the queue is still busy.
pub const WORK_BACKOFF: Duration = Duration::from_millis(100);

/// Delay before the first probe sweep after startup.
const PROBE_STARTUP_DELAY: Duration = Duration::from_millis(1000);

/// Delay before the first work sweep after startup.
const WORK_STARTUP_DELAY: Duration = Duration::from_millis(1200);

/// Scratch buffer size handed to devices producing requests.
const MAX_REQUEST_LEN: usize = 16;

/// What woke the event loop up.
enum Event {
    SerialReadable(usize),
    ProbeTick,
    WorkTick,
    ResponseTimeout,
    GapElapsed,
    StalenessSweep,
}

/// The bus master: state machine plus event loop.
///
/// Generic over the stream so tests can substitute an in-memory duplex
/// pipe for the RS-485 TTY.
pub struct Master<S> {
    stream: S,
    scanner: FrameScanner,
    queue: TransmitQueue,
    registry: SlaveRegistry,

    probe_at: Instant,
    work_at: Instant,
    /// Armed exactly while the head frame is on the wire unanswered.
    response_deadline: Option<Instant>,
    /// Armed for the quiet period after each completed transaction.
    interframe_gap: Option<Instant>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Master<S> {
    /// Create a master over a stream and a populated slave registry.
    pub fn new(stream: S, registry: SlaveRegistry) -> Self {
        let now = Instant::now();
        Self {
            stream,
            scanner: FrameScanner::new(),
            queue: TransmitQueue::new(),
            registry,
            probe_at: now + PROBE_STARTUP_DELAY,
            work_at: now + WORK_STARTUP_DELAY,
            response_deadline: None,
            interframe_gap: None,
        }
    }

    /// Borrow the slave registry.
    pub fn registry(&self) -> &SlaveRegistry {
        &self.registry
    }

    /// Run the engine until a fatal TTY error.
    ///
    /// Per-transaction failures (timeouts, bad checksums, unknown
    /// addresses) are logged and the bus moves on; only losing the TTY
    /// itself ends the loop.
    pub async fn run(&mut self) -> Result<(), BusError> {
        let mut read_buf = [0u8; 256];

        loop {
            let event = tokio::select! {
                read = self.stream.read(&mut read_buf) => Event::SerialReadable(read?),
                _ = time::sleep_until(self.probe_at) => Event::ProbeTick,
                _ = time::sleep_until(self.work_at) => Event::WorkTick,
                _ = sleep_opt(self.response_deadline) => Event::ResponseTimeout,
                _ = sleep_opt(self.interframe_gap) => Event::GapElapsed,
                _ = sleep_opt(self.registry.next_staleness()) => Event::StalenessSweep,
            };

            match event {
                Event::SerialReadable(0) => {
                    error!("tty EOF, shutting down");
                    return Err(BusError::TtyEof);
                }
                Event::SerialReadable(n) => {
                    for frame in self.scanner.push(&read_buf[..n]) {
                        self.on_frame(frame).await?;
                    }
                }
                Event::ProbeTick => self.on_probe_tick().await?,
                Event::WorkTick => self.on_work_tick().await?,
                Event::ResponseTimeout => self.on_response_timeout().await?,
                Event::GapElapsed => self.on_gap_elapsed().await?,
                Event::StalenessSweep => self.registry.expire_stale(Instant::now()),
            }
        }
    }

    /// Frame the payload, queue it, and start transmitting if the line
    /// is idle.
    async fn submit(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let frame = protocol::build_frame(payload)?;

        let was_idle = self.queue.is_empty();
        self.queue.enqueue(payload[0], frame)?;

        // A pending interframe gap owns the line; its callback picks the
        // queue back up.
        if was_idle && self.interframe_gap.is_none() {
            self.transmit_head().await?;
        }
        Ok(())
    }

    /// Like [`Self::submit`], but only stream errors propagate; refusals
    /// cost the request, not the engine.
    async fn try_submit(&mut self, payload: &[u8]) -> Result<(), BusError> {
        match self.submit(payload).await {
            Err(BusError::Io(err)) => Err(BusError::Io(err)),
            Err(err) => {
                warn!("dropping request for {:#04x}: {}", payload[0], err);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Write the head frame to the wire and arm the response deadline.
    async fn transmit_head(&mut self) -> Result<(), BusError> {
        let Some(head) = self.queue.head() else {
            return Ok(());
        };

        trace!("transmitting {} bytes to {:#04x}", head.bytes().len(), head.addr());
        self.stream.write_all(head.bytes()).await?;
        self.stream.flush().await?;

        // The deadline includes the time spent clocking the request out.
        self.response_deadline = Some(Instant::now() + RESPONSE_TIMEOUT);
        Ok(())
    }

    /// A complete frame came off the scanner.
    async fn on_frame(&mut self, mut frame: bytes::BytesMut) -> Result<(), BusError> {
        let Some(head) = self.queue.head() else {
            error!("discarding unsolicited reply");
            return Ok(());
        };
        let addr = head.addr();

        self.response_deadline = None;

        // The reply belongs to the head whether or not it decodes; a
        // corrupt reply is a lost reply, not a second chance.
        match protocol::parse_frame(&mut frame) {
            Ok(payload) => self.dispatch(addr, payload),
            Err(err) => error!("error decoding frame: {}", err),
        }

        self.queue.pop_head();
        self.interframe_gap = Some(Instant::now() + INTERFRAME_GAP);
        Ok(())
    }

    /// Route a decoded reply to the slave the head request addressed.
    fn dispatch(&mut self, addr: u8, payload: &[u8]) {
        let now = Instant::now();
        let Some(idx) = self.registry.lookup(addr) else {
            warn!("unhandled reply: {}", BusError::UnknownSlave(addr));
            return;
        };

        if payload[1] == OP_PROBE_REPLY {
            if !self.registry.get(idx).is_connected() {
                debug!("slave {:#04x} connected", addr);
            }
            self.registry.mark_alive(idx, now);
            self.registry.get_mut(idx).device_mut().handle_probe_reply(payload);
        } else {
            let entry = self.registry.get_mut(idx);
            if let Err(err) = entry.device_mut().handle_reply(payload) {
                warn!("{} at {:#04x}: {}", entry.device_mut().name(), addr, err);
            }
            // Any reply proves the slave is alive.
            self.registry.refresh(idx, now);
        }
    }

    /// The head request went unanswered.
    async fn on_response_timeout(&mut self) -> Result<(), BusError> {
        self.response_deadline = None;

        if let Some(dead) = self.queue.pop_head() {
            error!("response timeout on request to slave {:#04x}", dead.addr());
        }

        // No reply means no bus traffic, so the line is already quiet;
        // the next request goes out without an interframe gap.
        if !self.queue.is_empty() {
            self.transmit_head().await?;
        }
        Ok(())
    }

    /// The mandated quiet period after a reply has passed.
    async fn on_gap_elapsed(&mut self) -> Result<(), BusError> {
        self.interframe_gap = None;
        if !self.queue.is_empty() {
            self.transmit_head().await?;
        }
        Ok(())
    }

    /// Probe sweep: queue a probe for every slave not currently connected.
    async fn on_probe_tick(&mut self) -> Result<(), BusError> {
        let silent: Vec<u8> = self
            .registry
            .entries()
            .filter(|entry| !entry.is_connected())
            .map(|entry| entry.addr())
            .collect();

        for addr in silent {
            self.try_submit(&[addr, OP_PROBE_REQUEST]).await?;
        }

        self.probe_at = Instant::now() + PROBE_PERIOD;
        Ok(())
    }

    /// Work sweep: collect one request from each willing device.
    async fn on_work_tick(&mut self) -> Result<(), BusError> {
        if !self.queue.is_empty() {
            warn!("bus contention, delaying device work");
            self.work_at = Instant::now() + WORK_BACKOFF;
            return Ok(());
        }

        let mut requests: Vec<([u8; MAX_REQUEST_LEN], usize)> = Vec::new();
        for entry in self.registry.entries_mut() {
            let mut buf = [0u8; MAX_REQUEST_LEN];
            if let Some(len) = entry.device_mut().next_request(&mut buf) {
                debug_assert!(len <= MAX_REQUEST_LEN);
                buf[0] = entry.addr();
                requests.push((buf, len.min(MAX_REQUEST_LEN)));
            }
        }

        for (buf, len) in requests {
            self.try_submit(&buf[..len]).await?;
        }

        self.work_at = Instant::now() + WORK_PERIOD;
        Ok(())
    }
}

/// Sleep until an optional deadline; never wake when it is unarmed.
async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
