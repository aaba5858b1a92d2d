//! Typed controller operations
//!
//! [`LaserController`] wraps a [`LaserLink`] with one method per controller
//! operation. Each operation gets its own deadline of
//! [`ControllerConfig::timeout`]; multi-command operations share that single
//! deadline across all of their commands.

use std::time::Duration;

use laser_detect::DeviceDescriptor;
use laser_protocol::{
    Command, DecodeResponse, DeviceVersion, EncodeArgument, LaserParameters, PowerState,
    DEFAULT_TIMEOUT,
};
use tokio::time::Instant;
use tracing::error;

use crate::error::LinkError;
use crate::link::LaserLink;

/// Version of this driver
pub const DRIVER_VERSION: &str = "1.0";

/// Controller facade configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Deadline of each operation
    pub timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How to pick the device to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIdentifier {
    /// Device path, e.g. `/dev/ttyUSB0`
    Path(String),
    /// Friendly name as listed by discovery
    Name(String),
}

/// Log a failed operation and pass the error on
fn logged<T>(operation: &str, result: Result<T, LinkError>) -> Result<T, LinkError> {
    result.map_err(|e| {
        error!("{} failed: {}", operation, e);
        e
    })
}

/// Laser/pulse controller operations
#[derive(Clone)]
pub struct LaserController {
    link: LaserLink,
    config: ControllerConfig,
}

impl LaserController {
    pub fn new(link: LaserLink, config: ControllerConfig) -> Self {
        Self { link, config }
    }

    /// The underlying link
    pub fn link(&self) -> &LaserLink {
        &self.link
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.timeout
    }

    pub fn driver_version(&self) -> &'static str {
        DRIVER_VERSION
    }

    pub fn serial_devices(&self) -> Result<Vec<DeviceDescriptor>, LinkError> {
        logged("List serial devices", self.link.list_devices())
    }

    pub async fn connect(&self, device: &DeviceIdentifier) -> Result<(), LinkError> {
        let result = match device {
            DeviceIdentifier::Path(path) => self.link.connect_by_path(path).await,
            DeviceIdentifier::Name(name) => self.link.connect_by_name(name).await,
        };
        logged("Connect", result)
    }

    pub async fn disconnect(&self) -> Result<(), LinkError> {
        logged("Disconnect", self.link.disconnect().await)
    }

    /// Hardware and firmware revision of the controller
    pub async fn device_version(&self) -> Result<DeviceVersion, LinkError> {
        let result: Result<DeviceVersion, LinkError> = async {
            let reply = self
                .link
                .execute_command(Command::GetVersion, &[], self.deadline())
                .await?;
            Ok(DeviceVersion::decode(&reply)?)
        }
        .await;
        logged("Get device version", result)
    }

    pub async fn set_power(&self, master: bool) -> Result<(), LinkError> {
        let result: Result<(), LinkError> = async {
            let argument = PowerState::new(master).encode()?;
            self.link
                .execute_command(Command::SetPower, &argument, self.deadline())
                .await?;
            Ok(())
        }
        .await;
        logged("Set power", result)
    }

    pub async fn power(&self) -> Result<PowerState, LinkError> {
        let result: Result<PowerState, LinkError> = async {
            let reply = self
                .link
                .execute_command(Command::GetPower, &[], self.deadline())
                .await?;
            Ok(PowerState::decode(&reply)?)
        }
        .await;
        logged("Get power", result)
    }

    /// Stage exposure, filter and delay
    ///
    /// All three values are range checked before anything is sent. The
    /// commands go out in that order, each after the previous one completed.
    /// Staged values take effect on [`commit_parameters`](Self::commit_parameters).
    pub async fn set_laser_parameters(&self, params: &LaserParameters) -> Result<(), LinkError> {
        let result: Result<(), LinkError> = async {
            params.validate()?;
            let deadline = self.deadline();
            self.link
                .execute_command(Command::SetExposure, &params.exposure_argument()?, deadline)
                .await?;
            self.link
                .execute_command(Command::SetFilter, &params.filter_argument()?, deadline)
                .await?;
            self.link
                .execute_command(Command::SetDelay, &params.delay_argument()?, deadline)
                .await?;
            Ok(())
        }
        .await;
        logged("Set laser parameters", result)
    }

    pub async fn laser_parameters(&self) -> Result<LaserParameters, LinkError> {
        let result: Result<LaserParameters, LinkError> = async {
            let deadline = self.deadline();
            let exposure = self
                .link
                .execute_command(Command::GetExposure, &[], deadline)
                .await?;
            let filter = self
                .link
                .execute_command(Command::GetFilter, &[], deadline)
                .await?;
            let delay = self
                .link
                .execute_command(Command::GetDelay, &[], deadline)
                .await?;
            Ok(LaserParameters::from_replies(&exposure, &filter, &delay)?)
        }
        .await;
        logged("Get laser parameters", result)
    }

    /// Apply the staged laser parameters
    pub async fn commit_parameters(&self) -> Result<(), LinkError> {
        logged("Commit parameters", self.simple(Command::CommitParameters).await)
    }

    /// Arm (`true`) or cancel (`false`) the trigger
    pub async fn control_laser(&self, enable: bool) -> Result<(), LinkError> {
        let command = if enable {
            Command::ArmTrigger
        } else {
            Command::CancelTrigger
        };
        logged("Control laser", self.simple(command).await)
    }

    pub async fn reset_controller(&self) -> Result<(), LinkError> {
        logged("Reset controller", self.simple(Command::Reset).await)
    }

    /// Argument-less command without a reply
    async fn simple(&self, command: Command) -> Result<(), LinkError> {
        self.link
            .execute_command(command, &[], self.deadline())
            .await
            .map(|_| ())
    }
}
