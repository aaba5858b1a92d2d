//! Error types for laser controller framing and parameter encoding

use thiserror::Error;

/// Errors raised while framing commands or decoding replies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Argument does not match the descriptor's request length
    #[error("{command}: argument is {actual} bytes, expected {expected}")]
    ArgumentLength {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Reply does not match the descriptor's response length
    #[error("{command}: response is {actual} bytes, expected {expected}")]
    ResponseLength {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Opcode not present in the command registry
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Value does not fit the wire field
    #[error("{field} value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        field: &'static str,
        value: u32,
        bits: u8,
    },
}
