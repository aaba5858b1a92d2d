//! Byte transports
//!
//! The engine drives any async byte stream. Real controllers are reached
//! through `tokio_serial`; simulated controllers and tests hand the engine one
//! end of a `tokio::io::duplex()` pair through [`FnOpener`].

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::debug;

/// A bidirectional byte stream the engine can drive
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned, type-erased transport
pub type BoxedTransport = Box<dyn Transport>;

/// Serial line settings
///
/// These are fixed by the controller protocol and never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: laser_protocol::BAUD_RATE,
            data_bits: data_bits(laser_protocol::DATA_BITS),
            parity: Parity::None,
            stop_bits: stop_bits(laser_protocol::STOP_BITS),
            flow_control: FlowControl::None,
        }
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

/// Opens a transport for a device path
pub trait TransportOpener: Send + Sync {
    /// Open `path` with the given line settings
    fn open(&self, path: &str, line: &LineConfig) -> io::Result<BoxedTransport>;
}

/// Opens real serial ports through `tokio_serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    fn open(&self, path: &str, line: &LineConfig) -> io::Result<BoxedTransport> {
        debug!(
            "Opening serial port {} ({} baud, {:?}/{:?}/{:?})",
            path, line.baud_rate, line.data_bits, line.parity, line.stop_bits
        );
        let stream = tokio_serial::new(path, line.baud_rate)
            .data_bits(line.data_bits)
            .parity(line.parity)
            .stop_bits(line.stop_bits)
            .flow_control(line.flow_control)
            .open_native_async()?;
        Ok(Box::new(stream))
    }
}

/// Opener backed by a closure
///
/// ```rust,no_run
/// use laser_link::{BoxedTransport, FnOpener};
///
/// let opener = FnOpener::new(|_path: &str, _line: &laser_link::LineConfig| {
///     let (ours, _theirs) = tokio::io::duplex(256);
///     Ok(Box::new(ours) as BoxedTransport)
/// });
/// ```
pub struct FnOpener<F> {
    open: F,
}

impl<F> FnOpener<F>
where
    F: Fn(&str, &LineConfig) -> io::Result<BoxedTransport> + Send + Sync,
{
    pub fn new(open: F) -> Self {
        Self { open }
    }
}

impl<F> TransportOpener for FnOpener<F>
where
    F: Fn(&str, &LineConfig) -> io::Result<BoxedTransport> + Send + Sync,
{
    fn open(&self, path: &str, line: &LineConfig) -> io::Result<BoxedTransport> {
        (self.open)(path, line)
    }
}
