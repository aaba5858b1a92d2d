//! Laser Controller Device Discovery
//!
//! This crate enumerates the serial devices currently attached to the host
//! and gives each one a friendly name, so callers can connect either by path
//! or by name.
//!
//! # Example
//!
//! ```rust,no_run
//! use laser_detect::{DeviceDiscovery, PortScanner};
//!
//! let scanner = PortScanner::new();
//! for (name, path) in scanner.list_devices().unwrap() {
//!     println!("{} -> {}", name, path);
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod scanner;

pub use discovery::{describe_devices, DeviceDescriptor, DeviceDiscovery, StaticDiscovery};
pub use error::DetectError;
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
