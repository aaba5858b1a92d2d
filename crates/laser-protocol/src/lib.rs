//! Laser Controller Protocol Library
//!
//! This crate defines the binary command set spoken by the serial
//! laser/pulse controller:
//!
//! - **Command registry**: opcode, request length and response length for
//!   every logical operation
//! - **Framing**: a command is its opcode followed by a fixed-length argument;
//!   the reply is a fixed number of bytes with no delimiter or checksum
//! - **Parameters**: 16-bit little-endian numeric fields, single-byte power and
//!   version fields
//!
//! # Example
//!
//! ```rust
//! use laser_protocol::{Command, DecodeResponse, DeviceVersion};
//!
//! let frame = Command::GetVersion.descriptor().frame(&[]).unwrap();
//! assert_eq!(frame, vec![0x00]);
//!
//! let version = DeviceVersion::decode(&[1, 2]).unwrap();
//! assert_eq!((version.hardware, version.firmware), (1, 2));
//! ```

use std::time::Duration;

pub mod command;
pub mod error;
pub mod params;

pub use command::{Command, CommandDescriptor};
pub use error::ProtocolError;
pub use params::{
    decode_u16_le, encode_u16_le, DecodeResponse, DeviceVersion, EncodeArgument, LaserParameters,
    PowerState,
};

/// Serial line speed
pub const BAUD_RATE: u32 = 115_200;

/// Data bits per character
pub const DATA_BITS: u8 = 8;

/// Stop bits per character
pub const STOP_BITS: u8 = 1;

/// Per-call timeout used by adapters when the caller supplies none
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
