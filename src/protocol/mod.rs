//! Protocol module - wire constants, frame codec, and frame scanner.
//!
//! This module implements the byte-stuffed framing used on the RS-485 bus:
//! - Frame build/parse with mod-256 checksum
//! - Byte-stuffing pack/unpack
//! - Scanner that locates complete frames in the raw byte stream

mod codec;
mod scanner;

pub use codec::{build_frame, checksum, parse_frame, stuff_into, unstuff_in_place};
pub use scanner::FrameScanner;

/// Frame start delimiter. Never stuffed; exclusively marks a frame boundary.
pub const FRAME_HEADER: [u8; 2] = [0x10, 0x02];

/// Frame end delimiter.
pub const FRAME_FOOTER: [u8; 2] = [0x10, 0x03];

/// The byte that must be escaped inside payload and checksum.
pub const ESCAPE: u8 = 0x10;

/// Smallest well-formed frame: header, checksum byte, footer.
pub const MIN_FRAME_LEN: usize = 5;

/// Largest frame the transmit path accepts, in on-wire (stuffed) form.
pub const MAX_FRAME_LEN: usize = 32;

/// A payload carries at least a destination address and a command opcode.
pub const MIN_PAYLOAD_LEN: usize = 2;

/// Largest payload [`build_frame`] accepts.
pub const MAX_PAYLOAD_LEN: usize = 30;

/// Probe request opcode (master to slave).
pub const OP_PROBE_REQUEST: u8 = 0x00;

/// Probe reply opcode (slave to master). Handled by the engine itself.
pub const OP_PROBE_REPLY: u8 = 0x01;
