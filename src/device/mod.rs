//! Device abstraction for slave implementations.
//!
//! The engine knows nothing about what a slave does; it only probes, polls
//! and routes. Everything device-specific sits behind the [`Device`] trait:
//! decoding replies, producing the next request, and optionally reacting
//! to probe acknowledgements. All hooks run on the reactor thread and must
//! return promptly.

mod heater;
mod panel;

pub use heater::{JxiHeater, JXI_HEATER_ADDR};
pub use panel::ControlPanel;

use thiserror::Error;

/// Errors a device hook can report back to the engine.
///
/// These never stall the bus: the transaction is already spent by the time
/// a hook runs, so the engine logs the error and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Reply payload is shorter than the opcode requires.
    #[error("reply truncated: {got} bytes, need {need}")]
    ShortReply {
        /// Bytes actually received.
        got: usize,
        /// Bytes the opcode requires.
        need: usize,
    },

    /// Reply opcode this device does not speak.
    #[error("unexpected opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Text does not fit the device's display.
    #[error("text too long for the display")]
    TextTooLong,
}

/// A slave device on the bus.
///
/// Replies passed to the hooks are complete unstuffed payloads: byte 0 is
/// the source address, byte 1 the opcode, the rest opcode-specific.
pub trait Device {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Handle a checksum-valid reply routed to this slave.
    fn handle_reply(&mut self, reply: &[u8]) -> Result<(), DeviceError>;

    /// Produce the next application request into `buf`.
    ///
    /// Returns the payload length, or `None` to skip this work cycle.
    /// Byte 0 is overwritten with the slave's bus address by the engine
    /// before framing, so devices may leave it zero.
    fn next_request(&mut self, buf: &mut [u8]) -> Option<usize> {
        let _ = buf;
        None
    }

    /// Called when a probe acknowledgement arrives from this slave.
    ///
    /// The engine already handles the connection bookkeeping; this hook is
    /// for devices whose acks carry extra data. The default does nothing.
    fn handle_probe_reply(&mut self, reply: &[u8]) {
        let _ = reply;
    }
}
