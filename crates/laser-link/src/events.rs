//! Link event stream
//!
//! Connection lifecycle and raw traffic are published on a broadcast channel
//! so that monitors and tests can observe the engine without touching it.

/// Events emitted by the link engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A transport was opened
    Connected {
        /// Device path
        path: String,
    },

    /// The transport was closed (disconnect, replacement or fault)
    Disconnected {
        /// Device path
        path: String,
    },

    /// The transport failed while reading
    TransportFault {
        /// Device path
        path: String,
        /// Error description
        message: String,
    },

    /// A command frame was written
    DataOut {
        /// Command name
        command: &'static str,
        /// Frame bytes
        data: Vec<u8>,
    },

    /// Bytes were read from the transport
    DataIn {
        /// Raw bytes
        data: Vec<u8>,
    },

    /// A command's deadline elapsed before its reply arrived
    ResponseTimeout {
        /// Command name
        command: &'static str,
    },

    /// Late reply bytes of a timed-out command were dropped
    StaleDiscarded {
        /// Command whose reply was dropped
        command: &'static str,
        /// Number of bytes dropped
        bytes: usize,
    },

    /// Unsolicited bytes were dropped
    NoiseDiscarded {
        /// Number of bytes dropped
        bytes: usize,
    },
}
