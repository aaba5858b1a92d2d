//! Laser Controller Link Engine
//!
//! This crate owns the serial connection to a laser/pulse controller and
//! turns its raw byte stream into request/response calls.
//!
//! # Architecture
//!
//! The controller's replies carry no request identifier, so the engine relies
//! on strict turn-taking:
//!
//! - **Connection manager**: opens, replaces and closes the single transport
//! - **Dispatcher**: queues `execute` calls and sends one command per turn
//! - **Demultiplexer**: collects exactly the expected number of reply bytes for
//!   the command holding the turn, and drops the late reply of a command whose
//!   deadline already passed
//!
//! All three live in one actor task behind the cloneable [`LaserLink`] handle.
//! [`LaserController`] adds typed operations on top.
//!
//! # Example
//!
//! ```rust,no_run
//! use laser_link::{ControllerConfig, DeviceIdentifier, LaserController, LaserLink, LinkConfig};
//!
//! # async fn run() -> Result<(), laser_link::LinkError> {
//! let link = LaserLink::serial(LinkConfig::default());
//! let controller = LaserController::new(link, ControllerConfig::default());
//!
//! controller
//!     .connect(&DeviceIdentifier::Path("/dev/ttyUSB0".into()))
//!     .await?;
//! let version = controller.device_version().await?;
//! println!("hw {} fw {}", version.hardware, version.firmware);
//! # Ok(())
//! # }
//! ```

mod actor;
pub mod config;
pub mod controller;
mod demux;
pub mod error;
pub mod events;
pub mod link;
pub mod transport;

pub use config::{LinkConfig, NoisePolicy};
pub use controller::{ControllerConfig, DeviceIdentifier, LaserController, DRIVER_VERSION};
pub use error::{ErrorKind, LinkError, StateError, StatusCode};
pub use events::LinkEvent;
pub use link::LaserLink;
pub use transport::{BoxedTransport, FnOpener, LineConfig, SerialOpener, Transport, TransportOpener};
