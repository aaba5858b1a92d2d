//! Link handle
//!
//! [`LaserLink`] is the public face of the engine. It is cheap to clone and
//! every clone talks to the same link actor, so any number of tasks may call
//! [`LaserLink::execute`] at once; their commands queue and go out one turn
//! at a time.

use std::sync::Arc;

use laser_detect::{describe_devices, DeviceDescriptor, DeviceDiscovery, PortScanner};
use laser_protocol::{Command, CommandDescriptor};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::actor::{run_link_actor, ExecuteRequest, LinkActor, LinkActorCommand, LinkOutputs};
use crate::config::LinkConfig;
use crate::error::{LinkError, StateError};
use crate::events::LinkEvent;
use crate::transport::{SerialOpener, TransportOpener};

/// Capacity of the reader to actor channel
const READER_CHANNEL_CAPACITY: usize = 64;

struct LinkInner {
    cmd_tx: mpsc::Sender<LinkActorCommand>,
    path_rx: watch::Receiver<Option<String>>,
    event_tx: broadcast::Sender<LinkEvent>,
    discovery: Arc<dyn DeviceDiscovery>,
}

/// Handle to a serial command correlation engine
///
/// The engine task runs until the last clone of the handle is dropped, then
/// closes any open connection.
#[derive(Clone)]
pub struct LaserLink {
    inner: Arc<LinkInner>,
}

impl LaserLink {
    /// Start an engine on the current tokio runtime
    pub fn spawn(
        config: LinkConfig,
        opener: Arc<dyn TransportOpener>,
        discovery: Arc<dyn DeviceDiscovery>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.queue_depth.max(1));
        let (reader_tx, reader_rx) = mpsc::channel(READER_CHANNEL_CAPACITY);
        let (path_tx, path_rx) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let outputs = LinkOutputs {
            path_tx,
            event_tx: event_tx.clone(),
        };
        let actor = LinkActor::new(config, opener, reader_tx, outputs);
        tokio::spawn(run_link_actor(actor, cmd_rx, reader_rx));

        Self {
            inner: Arc::new(LinkInner {
                cmd_tx,
                path_rx,
                event_tx,
                discovery,
            }),
        }
    }

    /// Start an engine on real serial ports
    pub fn serial(config: LinkConfig) -> Self {
        Self::spawn(config, Arc::new(SerialOpener), Arc::new(PortScanner::new()))
    }

    /// Open the device at `path`
    ///
    /// An open connection is closed first; a command waiting on it fails with
    /// [`StateError::Replaced`].
    pub async fn connect_by_path(&self, path: &str) -> Result<(), LinkError> {
        info!("Connecting to {}", path);
        let (tx, rx) = oneshot::channel();
        self.send(LinkActorCommand::Connect {
            path: path.to_string(),
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| StateError::Stopped)?
    }

    /// Open the device listed under `name`
    pub async fn connect_by_name(&self, name: &str) -> Result<(), LinkError> {
        let devices = self.inner.discovery.list_devices()?;
        let path = devices
            .get(name)
            .ok_or_else(|| LinkError::NotFound(name.to_string()))?;
        debug!("Resolved {} to {}", name, path);
        self.connect_by_path(path).await
    }

    /// Close the open connection
    ///
    /// Closing while disconnected is not an error.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let (tx, rx) = oneshot::channel();
        self.send(LinkActorCommand::Disconnect { response: tx })
            .await?;
        rx.await.map_err(|_| StateError::Stopped)?;
        Ok(())
    }

    /// Send one command and wait for its reply
    ///
    /// Returns exactly `descriptor.response_len` bytes. The wait for a turn and
    /// the wait for the reply are both bounded by `deadline`.
    pub async fn execute(
        &self,
        descriptor: CommandDescriptor,
        argument: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, LinkError> {
        let frame = descriptor.frame(argument)?;
        if !self.is_connected() {
            return Err(StateError::NotConnected.into());
        }

        let command = descriptor.name;
        let (tx, rx) = oneshot::channel();
        let request = LinkActorCommand::Execute(ExecuteRequest {
            descriptor,
            frame,
            deadline,
            response: tx,
        });

        match timeout_at(deadline, self.inner.cmd_tx.send(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(StateError::Stopped.into()),
            Err(_) => return Err(LinkError::Timeout { command }),
        }

        match timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StateError::Stopped.into()),
            Err(_) => Err(LinkError::Timeout { command }),
        }
    }

    /// [`execute`](Self::execute) by logical command
    pub async fn execute_command(
        &self,
        command: Command,
        argument: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, LinkError> {
        self.execute(command.descriptor(), argument, deadline).await
    }

    /// Attached devices, with the open one flagged as connected
    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, LinkError> {
        let devices = self.inner.discovery.list_devices()?;
        let connected = self.connected_path();
        Ok(describe_devices(&devices, connected.as_deref()))
    }

    /// Whether a connection is open
    pub fn is_connected(&self) -> bool {
        self.inner.path_rx.borrow().is_some()
    }

    /// Path of the open connection
    pub fn connected_path(&self) -> Option<String> {
        self.inner.path_rx.borrow().clone()
    }

    /// Subscribe to link events
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.event_tx.subscribe()
    }

    async fn send(&self, cmd: LinkActorCommand) -> Result<(), LinkError> {
        self.inner
            .cmd_tx
            .send(cmd)
            .await
            .map_err(|_| StateError::Stopped.into())
    }
}
