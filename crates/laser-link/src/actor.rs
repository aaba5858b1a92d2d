//! Link actor
//!
//! All connection state lives in one task. Callers talk to it through
//! [`LinkActorCommand`] messages, the per-connection reader task talks to it
//! through [`ReaderMessage`]s, and the waiter slot is owned by its
//! [`ResponseDemux`]. Nothing is shared behind a lock.
//!
//! # Turn taking
//!
//! `Execute` requests are queued in arrival order. The head of the queue is
//! dispatched only while the waiter slot is free, so at most one command is
//! ever awaiting its reply on the wire. A request leaves the slot when its reply
//! is complete, when its deadline passes, or when the connection goes away.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use laser_protocol::CommandDescriptor;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::demux::{
    run_read_loop, DemuxOutcome, PendingResponse, ReaderMessage, ResponseDemux, ResponseSender,
};
use crate::error::{LinkError, StateError};
use crate::events::LinkEvent;
use crate::transport::{BoxedTransport, TransportOpener};

/// How long a reader task gets to stop on its own before it is aborted
const READER_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// One queued `Execute` call
pub(crate) struct ExecuteRequest {
    pub descriptor: CommandDescriptor,
    pub frame: Vec<u8>,
    pub deadline: Instant,
    pub response: ResponseSender,
}

/// Commands sent to the link actor
pub(crate) enum LinkActorCommand {
    /// Open `path`, replacing any open connection
    Connect {
        path: String,
        response: oneshot::Sender<Result<(), LinkError>>,
    },

    /// Close the open connection, if any
    Disconnect { response: oneshot::Sender<()> },

    /// Queue a command for its turn
    Execute(ExecuteRequest),
}

/// An open transport
struct Connection {
    path: String,
    epoch: u64,
    writer: WriteHalf<BoxedTransport>,
    shutdown_tx: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

/// Channels the actor publishes on
pub(crate) struct LinkOutputs {
    pub path_tx: watch::Sender<Option<String>>,
    pub event_tx: broadcast::Sender<LinkEvent>,
}

/// Internal state of the link actor
pub(crate) struct LinkActor {
    config: LinkConfig,
    opener: Arc<dyn TransportOpener>,
    connection: Option<Connection>,
    queue: VecDeque<ExecuteRequest>,
    demux: ResponseDemux,
    epoch: u64,
    reader_tx: mpsc::Sender<ReaderMessage>,
    outputs: LinkOutputs,
}

impl LinkActor {
    pub fn new(
        config: LinkConfig,
        opener: Arc<dyn TransportOpener>,
        reader_tx: mpsc::Sender<ReaderMessage>,
        outputs: LinkOutputs,
    ) -> Self {
        let demux = ResponseDemux::new(&config);
        Self {
            config,
            opener,
            connection: None,
            queue: VecDeque::new(),
            demux,
            epoch: 0,
            reader_tx,
            outputs,
        }
    }

    fn emit(&self, event: LinkEvent) {
        // No subscribers is fine
        let _ = self.outputs.event_tx.send(event);
    }

    async fn handle_command(&mut self, cmd: LinkActorCommand) {
        match cmd {
            LinkActorCommand::Connect { path, response } => {
                let result = self.connect(path).await;
                let _ = response.send(result);
            }

            LinkActorCommand::Disconnect { response } => {
                self.close_connection(StateError::Disconnected).await;
                let _ = response.send(());
            }

            LinkActorCommand::Execute(request) => {
                self.queue.push_back(request);
            }
        }
    }

    async fn connect(&mut self, path: String) -> Result<(), LinkError> {
        self.close_connection(StateError::Replaced).await;

        let transport = self
            .opener
            .open(&path, &self.config.line)
            .map_err(|source| LinkError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        let (reader, writer) = tokio::io::split(transport);

        self.epoch += 1;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(run_read_loop(
            reader,
            path.clone(),
            self.epoch,
            self.reader_tx.clone(),
            shutdown_rx,
            self.config.read_buffer_size,
        ));

        self.demux = ResponseDemux::new(&self.config);
        self.connection = Some(Connection {
            path: path.clone(),
            epoch: self.epoch,
            writer,
            shutdown_tx,
            reader,
        });

        info!("Connected to {}", path);
        self.outputs.path_tx.send_replace(Some(path.clone()));
        self.emit(LinkEvent::Connected { path });
        Ok(())
    }

    /// Close the connection and release the waiter with `reason`
    ///
    /// Waits for the reader task to finish so the device can be reopened
    /// right away.
    async fn close_connection(&mut self, reason: StateError) {
        let connection = self.connection.take();
        if connection.is_some() {
            self.outputs.path_tx.send_replace(None);
        }
        if let Some(command) = self.demux.abort(reason) {
            debug!("Released {} waiter: {}", command, reason);
        }

        let Some(Connection {
            path,
            writer,
            shutdown_tx,
            mut reader,
            ..
        }) = connection
        else {
            return;
        };

        let _ = shutdown_tx.send(());
        if timeout(READER_SHUTDOWN_GRACE, &mut reader).await.is_err() {
            reader.abort();
            let _ = reader.await;
        }
        drop(writer);

        info!("Disconnected from {} ({})", path, reason);
        self.emit(LinkEvent::Disconnected { path });
    }

    async fn handle_reader_message(&mut self, message: ReaderMessage) {
        let current = self.connection.as_ref().map(|c| c.epoch);

        match message {
            ReaderMessage::Data { epoch, data } => {
                if current != Some(epoch) {
                    debug!("Ignoring {} bytes from closed connection", data.len());
                    return;
                }

                let outcome = self.demux.ingest(&data, Instant::now());
                self.emit(LinkEvent::DataIn { data });
                self.report(outcome);
            }

            ReaderMessage::Failed { epoch, error } => {
                if current != Some(epoch) {
                    return;
                }
                let path = self
                    .connection
                    .as_ref()
                    .map(|c| c.path.clone())
                    .unwrap_or_default();
                warn!("Transport fault on {}: {}", path, error);
                self.emit(LinkEvent::TransportFault {
                    path,
                    message: error.to_string(),
                });
                self.close_connection(StateError::ConnectionLost).await;
            }
        }
    }

    /// Log and publish what the demultiplexer did
    fn report(&self, outcome: DemuxOutcome) {
        if let Some((command, bytes)) = outcome.stale_discarded {
            warn!("Discarded {} late byte(s) of {}", bytes, command);
            self.emit(LinkEvent::StaleDiscarded { command, bytes });
        }
        if outcome.noise_discarded > 0 {
            warn!("Discarded {} unsolicited byte(s)", outcome.noise_discarded);
            self.emit(LinkEvent::NoiseDiscarded {
                bytes: outcome.noise_discarded,
            });
        }
        if let Some(command) = outcome.completed {
            debug!("{} completed", command);
        }
        if let Some(command) = outcome.timed_out {
            warn!("{} timed out waiting for its reply", command);
            self.emit(LinkEvent::ResponseTimeout { command });
        }
    }

    /// Settle a reply or expire the waiter once its time has come
    fn poll_pending(&mut self) {
        let outcome = self.demux.poll(Instant::now());
        self.report(outcome);
    }

    /// Hand out turns while the waiter slot is free
    async fn dispatch_queued(&mut self) {
        while !self.demux.is_busy() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(request).await;
        }
    }

    async fn dispatch(&mut self, request: ExecuteRequest) {
        let ExecuteRequest {
            descriptor,
            frame,
            deadline,
            response,
        } = request;
        let command = descriptor.name;

        // Caller already gave up
        if response.is_closed() {
            debug!("Dropping abandoned {}", command);
            return;
        }
        if Instant::now() >= deadline {
            let _ = response.send(Err(LinkError::Timeout { command }));
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            let _ = response.send(Err(StateError::NotConnected.into()));
            return;
        };

        debug!("Sending {} to {}: {:02X?}", command, connection.path, frame);
        let written = timeout_at(deadline, async {
            connection.writer.write_all(&frame).await?;
            connection.writer.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                warn!("Write of {} failed: {}", command, source);
                let _ = response.send(Err(LinkError::WriteFailed { command, source }));
                return;
            }
            Err(_) => {
                // Some of the frame may be out already
                warn!("Write of {} did not finish before its deadline", command);
                self.demux.mark_stale(&descriptor, 0, Instant::now());
                let _ = response.send(Err(LinkError::Timeout { command }));
                return;
            }
        }

        self.emit(LinkEvent::DataOut {
            command,
            data: frame,
        });

        if descriptor.expects_response() {
            let pending = PendingResponse {
                descriptor,
                deadline,
                response,
            };
            let outcome = self.demux.register(pending, Instant::now());
            self.report(outcome);
        } else {
            let _ = response.send(Ok(Vec::new()));
        }
    }

    /// Fail every request still queued
    fn drain_queue(&mut self, reason: StateError) {
        for request in self.queue.drain(..) {
            let _ = request.response.send(Err(reason.into()));
        }
    }
}

/// Run the link actor until every handle is dropped
pub(crate) async fn run_link_actor(
    mut actor: LinkActor,
    mut cmd_rx: mpsc::Receiver<LinkActorCommand>,
    mut reader_rx: mpsc::Receiver<ReaderMessage>,
) {
    info!("Link actor started");

    loop {
        actor.dispatch_queued().await;
        let wakeup = actor.demux.next_wakeup();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                actor.handle_command(cmd).await;
            }

            Some(message) = reader_rx.recv() => {
                actor.handle_reader_message(message).await;
            }

            _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                actor.poll_pending();
            }
        }
    }

    actor.close_connection(StateError::Stopped).await;
    actor.drain_queue(StateError::Stopped);
    info!("Link actor stopped");
}
