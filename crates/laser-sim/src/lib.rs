//! Laser Controller Simulation Library
//!
//! This crate provides a virtual laser/pulse controller for exercising the
//! link engine without hardware:
//!
//! - **VirtualController**: applies command frames and produces replies of the
//!   exact registered length
//! - **run_virtual_controller_task**: serves a controller over any async byte
//!   stream, with controllable reply delay, muting and noise injection
//!
//! # Example
//!
//! ```rust
//! use laser_sim::VirtualController;
//!
//! let mut controller = VirtualController::new("Bench");
//!
//! // SetExposure(100) then GetExposure
//! controller.push_bytes(&[0x03, 0x64, 0x00, 0x04]);
//! assert_eq!(controller.take_output(), Some(vec![0x64, 0x00]));
//! ```

pub mod controller;
pub mod task;

pub use controller::{ControllerState, VirtualController, VirtualControllerConfig};
pub use task::{run_virtual_controller_task, VirtualControllerCommand};
