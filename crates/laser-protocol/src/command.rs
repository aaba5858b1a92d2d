//! Command registry
//!
//! Every logical controller operation maps to exactly one
//! [`CommandDescriptor`]. The descriptor is the only place where the wire
//! layout of a command is defined: a command is sent as its opcode followed by
//! `request_len` argument bytes, and the controller answers with exactly
//! `response_len` bytes. There are no delimiters or checksums.
//!
//! # Command Table
//! ```text
//! opcode  name               request  response
//! 0x00    GetVersion         0        2   [hardware, firmware]
//! 0x01    SetPower           1        0   [on]
//! 0x02    GetPower           0        1
//! 0x03    SetExposure        2        0   u16 LE
//! 0x04    GetExposure        0        2
//! 0x05    SetFilter          2        0   u16 LE
//! 0x06    GetFilter          0        2
//! 0x07    SetDelay           2        0   u16 LE
//! 0x08    GetDelay           0        2
//! 0x09    CommitParameters   0        0
//! 0x0A    ArmTrigger         0        0
//! 0x0B    CancelTrigger      0        0
//! 0x0C    Reset              0        0
//! ```

use crate::error::ProtocolError;

/// Static wire metadata for one logical command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandDescriptor {
    /// Opcode byte sent before the argument
    pub opcode: u8,
    /// Human-readable command name
    pub name: &'static str,
    /// Number of argument bytes following the opcode
    pub request_len: usize,
    /// Number of bytes the controller replies with
    pub response_len: usize,
}

impl CommandDescriptor {
    const fn new(opcode: u8, name: &'static str, request_len: usize, response_len: usize) -> Self {
        Self {
            opcode,
            name,
            request_len,
            response_len,
        }
    }

    /// Total number of bytes written for this command
    pub fn frame_len(&self) -> usize {
        1 + self.request_len
    }

    /// Whether the controller sends any reply to this command
    pub fn expects_response(&self) -> bool {
        self.response_len > 0
    }

    /// Build `opcode || argument`
    pub fn frame(&self, argument: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.check_argument(argument)?;
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.push(self.opcode);
        frame.extend_from_slice(argument);
        Ok(frame)
    }

    /// Validate an argument against the request length
    pub fn check_argument(&self, argument: &[u8]) -> Result<(), ProtocolError> {
        if argument.len() != self.request_len {
            return Err(ProtocolError::ArgumentLength {
                command: self.name,
                expected: self.request_len,
                actual: argument.len(),
            });
        }
        Ok(())
    }

    /// Validate a reply against the response length
    pub fn check_response(&self, response: &[u8]) -> Result<(), ProtocolError> {
        if response.len() != self.response_len {
            return Err(ProtocolError::ResponseLength {
                command: self.name,
                expected: self.response_len,
                actual: response.len(),
            });
        }
        Ok(())
    }
}

pub const GET_VERSION: CommandDescriptor = CommandDescriptor::new(0x00, "GetVersion", 0, 2);
pub const SET_POWER: CommandDescriptor = CommandDescriptor::new(0x01, "SetPower", 1, 0);
pub const GET_POWER: CommandDescriptor = CommandDescriptor::new(0x02, "GetPower", 0, 1);
pub const SET_EXPOSURE: CommandDescriptor = CommandDescriptor::new(0x03, "SetExposure", 2, 0);
pub const GET_EXPOSURE: CommandDescriptor = CommandDescriptor::new(0x04, "GetExposure", 0, 2);
pub const SET_FILTER: CommandDescriptor = CommandDescriptor::new(0x05, "SetFilter", 2, 0);
pub const GET_FILTER: CommandDescriptor = CommandDescriptor::new(0x06, "GetFilter", 0, 2);
pub const SET_DELAY: CommandDescriptor = CommandDescriptor::new(0x07, "SetDelay", 2, 0);
pub const GET_DELAY: CommandDescriptor = CommandDescriptor::new(0x08, "GetDelay", 0, 2);
pub const COMMIT_PARAMETERS: CommandDescriptor =
    CommandDescriptor::new(0x09, "CommitParameters", 0, 0);
pub const ARM_TRIGGER: CommandDescriptor = CommandDescriptor::new(0x0A, "ArmTrigger", 0, 0);
pub const CANCEL_TRIGGER: CommandDescriptor = CommandDescriptor::new(0x0B, "CancelTrigger", 0, 0);
pub const RESET: CommandDescriptor = CommandDescriptor::new(0x0C, "Reset", 0, 0);

/// Logical controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Query hardware and firmware version
    GetVersion,
    /// Switch master power on or off
    SetPower,
    /// Query master power
    GetPower,
    /// Set exposure in ticks
    SetExposure,
    /// Query exposure
    GetExposure,
    /// Set digital filter
    SetFilter,
    /// Query digital filter
    GetFilter,
    /// Set pulse delay
    SetDelay,
    /// Query pulse delay
    GetDelay,
    /// Apply staged exposure/filter/delay
    CommitParameters,
    /// Arm the trigger (laser enabled)
    ArmTrigger,
    /// Disarm the trigger (laser disabled)
    CancelTrigger,
    /// Reset the controller
    Reset,
}

impl Command {
    /// Every command in opcode order
    pub const ALL: [Command; 13] = [
        Command::GetVersion,
        Command::SetPower,
        Command::GetPower,
        Command::SetExposure,
        Command::GetExposure,
        Command::SetFilter,
        Command::GetFilter,
        Command::SetDelay,
        Command::GetDelay,
        Command::CommitParameters,
        Command::ArmTrigger,
        Command::CancelTrigger,
        Command::Reset,
    ];

    /// Wire metadata for this command
    pub const fn descriptor(self) -> CommandDescriptor {
        match self {
            Command::GetVersion => GET_VERSION,
            Command::SetPower => SET_POWER,
            Command::GetPower => GET_POWER,
            Command::SetExposure => SET_EXPOSURE,
            Command::GetExposure => GET_EXPOSURE,
            Command::SetFilter => SET_FILTER,
            Command::GetFilter => GET_FILTER,
            Command::SetDelay => SET_DELAY,
            Command::GetDelay => GET_DELAY,
            Command::CommitParameters => COMMIT_PARAMETERS,
            Command::ArmTrigger => ARM_TRIGGER,
            Command::CancelTrigger => CANCEL_TRIGGER,
            Command::Reset => RESET,
        }
    }

    /// Command name as it appears in logs
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Reverse lookup by opcode
    pub fn from_opcode(opcode: u8) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.descriptor().opcode == opcode)
            .ok_or(ProtocolError::UnknownOpcode(opcode))
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_opcode(value)
    }
}

impl From<Command> for CommandDescriptor {
    fn from(cmd: Command) -> Self {
        cmd.descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_are_unique_and_ordered() {
        for (i, cmd) in Command::ALL.iter().enumerate() {
            assert_eq!(cmd.descriptor().opcode as usize, i, "{:?}", cmd);
        }
    }

    #[test]
    fn test_table_lengths() {
        assert_eq!((GET_VERSION.request_len, GET_VERSION.response_len), (0, 2));
        assert_eq!((SET_POWER.request_len, SET_POWER.response_len), (1, 0));
        assert_eq!((GET_POWER.request_len, GET_POWER.response_len), (0, 1));
        assert_eq!((SET_EXPOSURE.request_len, SET_EXPOSURE.response_len), (2, 0));
        assert_eq!((GET_DELAY.request_len, GET_DELAY.response_len), (0, 2));
        assert_eq!((RESET.request_len, RESET.response_len), (0, 0));
    }

    #[test]
    fn test_frame_prepends_opcode() {
        let frame = SET_EXPOSURE.frame(&[0x64, 0x00]).unwrap();
        assert_eq!(frame, vec![0x03, 0x64, 0x00]);

        let frame = GET_VERSION.frame(&[]).unwrap();
        assert_eq!(frame, vec![0x00]);
    }

    #[test]
    fn test_frame_rejects_wrong_argument_length() {
        let err = SET_POWER.frame(&[]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ArgumentLength {
                command: "SetPower",
                expected: 1,
                actual: 0
            }
        );

        // Get commands take no argument, even one sized like the response
        assert!(GET_EXPOSURE.frame(&[0, 0]).is_err());
    }

    #[test]
    fn test_check_response() {
        assert!(GET_VERSION.check_response(&[1, 2]).is_ok());
        assert!(matches!(
            GET_VERSION.check_response(&[1]),
            Err(ProtocolError::ResponseLength { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_from_opcode() {
        assert_eq!(Command::from_opcode(0x0A).unwrap(), Command::ArmTrigger);
        assert_eq!(Command::try_from(0x02).unwrap(), Command::GetPower);
        assert_eq!(
            Command::from_opcode(0x42),
            Err(ProtocolError::UnknownOpcode(0x42))
        );
    }
}
