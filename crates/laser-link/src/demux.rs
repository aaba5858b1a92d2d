//! Response demultiplexing
//!
//! The serial line carries no request identifiers, so replies are attributed
//! purely by turn-taking: at most one command waits for a reply at a time and
//! the bytes read after its frame went out belong to it.
//!
//! [`ResponseDemux`] owns that single waiter slot together with the byte
//! accounting around it:
//!
//! - bytes accumulate until the waiter's reply length is reached, then the
//!   reply is handed over and the slot is cleared
//! - when a waiter's deadline passes it becomes stale: the reply bytes it is
//!   still owed are swallowed for `stale_window` instead of reaching the next
//!   caller
//! - bytes arriving with no waiter follow the [`NoisePolicy`]
//!
//! Late bytes of a stale command, or bytes kept under
//! [`NoisePolicy::Buffer`], may sit in front of the next reply. They are only
//! dropped once the full reply has arrived behind them. If the line goes quiet
//! for `settle_time` with a reply's worth of bytes in hand, the newest bytes
//! are the reply and the late reply is taken as lost.
//!
//! [`run_read_loop`] is the per-connection reader task feeding it.

use std::io::{self, ErrorKind};
use std::time::Duration;

use laser_protocol::{CommandDescriptor, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{LinkConfig, NoisePolicy};
use crate::error::{LinkError, StateError};

/// Reply channel of a waiting caller
pub(crate) type ResponseSender = oneshot::Sender<Result<Vec<u8>, LinkError>>;

/// A command whose reply is awaited
pub(crate) struct PendingResponse {
    pub descriptor: CommandDescriptor,
    pub deadline: Instant,
    pub response: ResponseSender,
}

/// Reply bytes still owed by a command that timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StaleResponse {
    command: &'static str,
    remaining: usize,
    expires: Instant,
}

/// What the demultiplexer did with incoming bytes or the passage of time
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct DemuxOutcome {
    /// Command whose waiter was answered with its reply
    pub completed: Option<&'static str>,
    /// Command whose waiter was answered with a timeout
    pub timed_out: Option<&'static str>,
    /// Stale command and the number of its late bytes dropped
    pub stale_discarded: Option<(&'static str, usize)>,
    /// Unsolicited bytes dropped
    pub noise_discarded: usize,
}

/// Single-slot response waiter with stale and noise accounting
pub(crate) struct ResponseDemux {
    policy: NoisePolicy,
    stale_window: Duration,
    settle_time: Duration,
    pending: Option<PendingResponse>,
    stale: Option<StaleResponse>,
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` that arrived before the waiter's frame
    early: usize,
    /// When a reply in hand but not yet told apart from leading bytes is taken
    settle_at: Option<Instant>,
}

impl ResponseDemux {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            policy: config.noise_policy,
            stale_window: config.stale_window,
            settle_time: config.settle_time,
            pending: None,
            stale: None,
            buffer: Vec::with_capacity(16),
            early: 0,
            settle_at: None,
        }
    }

    /// Whether a waiter currently occupies the slot
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline of the current waiter
    fn pending_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// When [`poll`](Self::poll) next has something to do
    pub fn next_wakeup(&self) -> Option<Instant> {
        let deadline = self.pending_deadline()?;
        Some(self.settle_at.map_or(deadline, |at| at.min(deadline)))
    }

    /// Occupy the slot right after the waiter's frame was written
    ///
    /// The slot must be free; the link actor only dispatches when it is.
    pub fn register(&mut self, pending: PendingResponse, now: Instant) -> DemuxOutcome {
        debug_assert!(self.pending.is_none(), "response slot already occupied");
        self.drop_expired_stale(now);
        self.pending = Some(pending);
        self.early = self.buffer.len();
        let outcome = self.resolve(now, false);
        self.arm_settle(now);
        outcome
    }

    /// Feed bytes read from the transport
    pub fn ingest(&mut self, data: &[u8], now: Instant) -> DemuxOutcome {
        self.drop_expired_stale(now);

        if self.pending.is_some() {
            self.buffer.extend_from_slice(data);
            let outcome = self.resolve(now, false);
            self.arm_settle(now);
            return outcome;
        }

        let mut outcome = DemuxOutcome::default();
        let mut data = data;

        // Nothing is on the wire, so these can only be late bytes or noise
        if let Some(stale) = self.stale.as_mut() {
            let n = stale.remaining.min(data.len());
            stale.remaining -= n;
            data = &data[n..];
            if n > 0 {
                outcome.stale_discarded = Some((stale.command, n));
            }
            if stale.remaining == 0 {
                self.stale = None;
            }
        }

        if data.is_empty() {
            return outcome;
        }

        match self.policy {
            NoisePolicy::Discard => outcome.noise_discarded = data.len(),
            NoisePolicy::Buffer { max_bytes } => {
                self.buffer.extend_from_slice(data);
                if self.buffer.len() > max_bytes {
                    let excess = self.buffer.len() - max_bytes;
                    self.buffer.drain(..excess);
                    outcome.noise_discarded = excess;
                }
            }
        }
        outcome
    }

    /// Act on the settle time or the waiter's deadline
    pub fn poll(&mut self, now: Instant) -> DemuxOutcome {
        self.drop_expired_stale(now);

        let settled = self.settle_at.is_some_and(|at| now >= at);
        let overdue = self.pending_deadline().is_some_and(|deadline| now >= deadline);
        let mut outcome = self.resolve(now, settled || overdue);
        if overdue {
            outcome.timed_out = self.expire(now);
        }
        outcome
    }

    fn drop_expired_stale(&mut self, now: Instant) {
        if let Some(stale) = self.stale {
            if now >= stale.expires {
                trace!("Stale window for {} expired", stale.command);
                self.stale = None;
            }
        }
    }

    /// Start the quiet timer while a reply's worth of bytes is in hand
    fn arm_settle(&mut self, now: Instant) {
        self.settle_at = self
            .pending
            .as_ref()
            .filter(|p| self.buffer.len() >= p.descriptor.response_len)
            .map(|_| now + self.settle_time);
    }

    /// Answer the waiter once its reply can be told apart from leading bytes
    fn resolve(&mut self, now: Instant, settled: bool) -> DemuxOutcome {
        let mut outcome = DemuxOutcome::default();
        let Some(descriptor) = self.pending.as_ref().map(|p| p.descriptor) else {
            return outcome;
        };
        let expected = descriptor.response_len;
        let leading = self.early + self.stale.map_or(0, |s| s.remaining);
        let received = self.buffer.len();

        if received >= leading + expected {
            self.deliver(leading, &mut outcome);
        } else if settled && received >= expected {
            let after_write = received - self.early;
            self.deliver(received - expected, &mut outcome);
            if after_write < expected {
                // Answered partly from bytes kept before the write; the rest
                // of its own reply may still come
                self.mark_stale(&descriptor, after_write, now);
            }
        }
        outcome
    }

    /// Drop `skip` leading bytes and hand the rest to the waiter
    fn deliver(&mut self, skip: usize, outcome: &mut DemuxOutcome) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let received = std::mem::take(&mut self.buffer);
        let early = std::mem::take(&mut self.early);
        let stale = self.stale.take();
        self.settle_at = None;

        let noise = skip.min(early);
        outcome.noise_discarded += noise;
        let late = skip - noise;
        if late > 0 {
            match stale {
                Some(stale) => outcome.stale_discarded = Some((stale.command, late)),
                None => outcome.noise_discarded += late,
            }
        }

        let command = pending.descriptor.name;
        let expected = pending.descriptor.response_len;
        let reply = &received[skip..];
        let result = if reply.len() == expected {
            Ok(reply.to_vec())
        } else {
            // More bytes than one reply: the surplus cannot be attributed, so
            // the reply cannot be trusted either
            Err(ProtocolError::ResponseLength {
                command,
                expected,
                actual: reply.len(),
            }
            .into())
        };
        // The caller may have given up already; its reply is simply dropped
        let _ = pending.response.send(result);
        outcome.completed = Some(command);
    }

    /// Answer the waiter with a timeout and mark what its reply still owes
    fn expire(&mut self, now: Instant) -> Option<&'static str> {
        let pending = self.pending.take()?;
        let command = pending.descriptor.name;
        let leading = std::mem::take(&mut self.early) + self.stale.map_or(0, |s| s.remaining);
        let received = std::mem::take(&mut self.buffer).len();
        self.settle_at = None;

        // Only bytes beyond the leading ones can be part of this reply
        self.mark_stale(&pending.descriptor, received.saturating_sub(leading), now);
        let _ = pending.response.send(Err(LinkError::Timeout { command }));
        Some(command)
    }

    /// Expect a late reply for a command that was sent but not awaited
    ///
    /// Replaces any older marker; that reply is taken as lost.
    pub fn mark_stale(&mut self, descriptor: &CommandDescriptor, received: usize, now: Instant) {
        let remaining = descriptor.response_len.saturating_sub(received);
        self.stale = (remaining > 0).then(|| StaleResponse {
            command: descriptor.name,
            remaining,
            expires: now + self.stale_window,
        });
    }

    /// Release the waiter with a state error and forget all buffered bytes
    pub fn abort(&mut self, reason: StateError) -> Option<&'static str> {
        self.buffer.clear();
        self.early = 0;
        self.settle_at = None;
        self.stale = None;
        let pending = self.pending.take()?;
        let _ = pending.response.send(Err(reason.into()));
        Some(pending.descriptor.name)
    }
}

/// Messages from a reader task to the link actor
#[derive(Debug)]
pub(crate) enum ReaderMessage {
    /// Bytes read from the connection opened as `epoch`
    Data { epoch: u64, data: Vec<u8> },
    /// The connection opened as `epoch` failed
    Failed { epoch: u64, error: io::Error },
}

/// Per-connection read loop
///
/// Forwards every chunk to the link actor tagged with the connection epoch, so
/// bytes from a connection that has since been replaced can be told apart.
/// Returns when shutdown is signalled (or its sender dropped), the actor goes
/// away, or the transport fails.
pub(crate) async fn run_read_loop<R>(
    mut reader: R,
    path: String,
    epoch: u64,
    data_tx: mpsc::Sender<ReaderMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    info!("Starting read loop on {} (epoch {})", path, epoch);
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Shutdown requested for read loop on {}", path);
                break;
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        let error = io::Error::new(ErrorKind::UnexpectedEof, "transport closed");
                        let _ = data_tx.send(ReaderMessage::Failed { epoch, error }).await;
                        break;
                    }
                    Ok(n) => {
                        trace!("Read {} bytes from {}: {:02X?}", n, path, &buffer[..n]);
                        let message = ReaderMessage::Data { epoch, data: buffer[..n].to_vec() };
                        if data_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                        continue;
                    }
                    Err(e) => {
                        warn!("Read error on {}: {}", path, e);
                        let _ = data_tx.send(ReaderMessage::Failed { epoch, error: e }).await;
                        break;
                    }
                }
            }
        }
    }

    info!("Read loop ended on {}", path);
}
