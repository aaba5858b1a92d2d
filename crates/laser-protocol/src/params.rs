//! Typed parameter encoding
//!
//! Numeric parameters (exposure, filter, delay) travel as 16-bit unsigned
//! little-endian integers. Power and version fields are single bytes.

use crate::command::{
    CommandDescriptor, GET_DELAY, GET_EXPOSURE, GET_FILTER, GET_POWER, GET_VERSION,
};
use crate::error::ProtocolError;

/// Encode a value as a 16-bit little-endian field
///
/// Values wider than 16 bits are rejected rather than truncated.
pub fn encode_u16_le(value: u32, field: &'static str) -> Result<[u8; 2], ProtocolError> {
    let narrow = u16::try_from(value).map_err(|_| ProtocolError::ValueOutOfRange {
        field,
        value,
        bits: 16,
    })?;
    Ok(narrow.to_le_bytes())
}

/// Decode a 16-bit little-endian field from a reply of `descriptor`
pub fn decode_u16_le(descriptor: &CommandDescriptor, bytes: &[u8]) -> Result<u16, ProtocolError> {
    descriptor.check_response(bytes)?;
    let field: [u8; 2] = bytes
        .try_into()
        .map_err(|_| ProtocolError::ResponseLength {
            command: descriptor.name,
            expected: 2,
            actual: bytes.len(),
        })?;
    Ok(u16::from_le_bytes(field))
}

/// Types that can be sent as a command argument
pub trait EncodeArgument {
    /// Encode to argument bytes
    fn encode(&self) -> Result<Vec<u8>, ProtocolError>;
}

/// Types that can be decoded from a command reply
pub trait DecodeResponse: Sized {
    /// Command whose reply this type decodes
    const DESCRIPTOR: CommandDescriptor;

    /// Decode from reply bytes
    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError>;
}

/// Controller hardware and firmware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceVersion {
    /// Hardware revision byte
    pub hardware: u8,
    /// Firmware revision byte
    pub firmware: u8,
}

impl DecodeResponse for DeviceVersion {
    const DESCRIPTOR: CommandDescriptor = GET_VERSION;

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::DESCRIPTOR.check_response(bytes)?;
        Ok(Self {
            hardware: bytes[0],
            firmware: bytes[1],
        })
    }
}

/// Master power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerState {
    /// Master power on
    pub master: bool,
}

impl PowerState {
    pub fn new(master: bool) -> Self {
        Self { master }
    }
}

impl EncodeArgument for PowerState {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(vec![u8::from(self.master)])
    }
}

impl DecodeResponse for PowerState {
    const DESCRIPTOR: CommandDescriptor = GET_POWER;

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::DESCRIPTOR.check_response(bytes)?;
        Ok(Self {
            master: bytes[0] == 1,
        })
    }
}

/// Exposure, digital filter and pulse delay
///
/// Fields are `u32` at the API boundary but must fit in 16 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaserParameters {
    /// Exposure time in controller ticks
    pub exposure_ticks: u32,
    /// Digital filter setting
    pub digital_filter: u32,
    /// Pulse delay in controller ticks
    pub pulse_delay: u32,
}

impl LaserParameters {
    /// Argument for SetExposure
    pub fn exposure_argument(&self) -> Result<[u8; 2], ProtocolError> {
        encode_u16_le(self.exposure_ticks, "exposure")
    }

    /// Argument for SetFilter
    pub fn filter_argument(&self) -> Result<[u8; 2], ProtocolError> {
        encode_u16_le(self.digital_filter, "filter")
    }

    /// Argument for SetDelay
    pub fn delay_argument(&self) -> Result<[u8; 2], ProtocolError> {
        encode_u16_le(self.pulse_delay, "delay")
    }

    /// Validate every field before any command is sent
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.exposure_argument()?;
        self.filter_argument()?;
        self.delay_argument()?;
        Ok(())
    }

    /// Assemble from the three Get* replies
    pub fn from_replies(exposure: &[u8], filter: &[u8], delay: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            exposure_ticks: decode_u16_le(&GET_EXPOSURE, exposure)?.into(),
            digital_filter: decode_u16_le(&GET_FILTER, filter)?.into(),
            pulse_delay: decode_u16_le(&GET_DELAY, delay)?.into(),
        })
    }
}
