//! Error types for poolbus.

use thiserror::Error;

/// Errors produced by the pure frame codec.
///
/// These map one-to-one onto the ways a delimited frame can be rejected;
/// the engine logs them and moves the bus along, they are never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame shorter than delimiters plus checksum, or payload under two bytes.
    #[error("frame or payload below the protocol minimum")]
    TooShort,

    /// Payload too long for the worst-case stuffed frame to fit on the wire.
    #[error("payload too long to frame")]
    Oversized,

    /// Leading or trailing delimiter bytes are wrong.
    #[error("bad frame delimiters")]
    MalformedDelimiter,

    /// Received checksum does not match the one computed over the payload.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },
}

/// Main error type for all bus-master operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// I/O error on the serial stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to encode or decode.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Framed request does not fit the on-wire transmit buffer.
    #[error("frame of {0} bytes exceeds the transmit buffer")]
    OversizedFrame(usize),

    /// Transmit queue is at capacity; the request is refused.
    #[error("transmit queue full")]
    QueueFull,

    /// No slave is registered at the given address.
    #[error("no slave registered at address {0:#04x}")]
    UnknownSlave(u8),

    /// A slave with this address is already registered.
    #[error("slave address {0:#04x} already registered")]
    AlreadyPresent(u8),

    /// The slave table has no free slots left.
    #[error("slave table full")]
    RegistryFull,

    /// Address 0 is the bus master itself and cannot name a slave.
    #[error("invalid slave address {0:#04x}")]
    InvalidAddress(u8),

    /// Serial port open or configuration failure.
    #[error("serial port error: {0}")]
    Serial(String),

    /// The TTY reached end of file; the bus is gone.
    #[error("tty reached end of file")]
    TtyEof,
}

impl From<tokio_serial::Error> for BusError {
    fn from(err: tokio_serial::Error) -> Self {
        BusError::Serial(err.to_string())
    }
}

/// Result type alias using [`BusError`].
pub type Result<T> = std::result::Result<T, BusError>;
