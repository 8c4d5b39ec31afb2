//! Frame scanner for the raw receive stream.
//!
//! Uses `bytes::BytesMut` for buffer management. Serial reads arrive in
//! arbitrary chunks, so the scanner accumulates bytes and carves out
//! complete delimited frames:
//! - bytes before a `0x10 0x02` header are line noise and get dropped
//! - a header without a footer yet means the frame is still in flight;
//!   the scanner keeps what it has and waits for more input
//!
//! Emitted frames are never rescanned; the scanner only moves forward.

use bytes::BytesMut;

use super::{FRAME_FOOTER, FRAME_HEADER};

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameScanner {
    buffer: BytesMut,
}

impl FrameScanner {
    /// Create a new, empty scanner.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Push data into the scanner and extract all complete frames.
    ///
    /// This is the main API for processing incoming serial data. Each
    /// returned buffer is one whole frame, delimiters included, ready for
    /// [`parse_frame`](super::parse_frame). Partial input stays buffered
    /// for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<BytesMut> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    /// Try to carve a single frame off the front of the buffer.
    ///
    /// Returns `None` when no complete frame is available. Pre-header
    /// garbage is discarded as a side effect, so repeated calls always
    /// make progress or leave the buffer untouched.
    fn try_extract_one(&mut self) -> Option<BytesMut> {
        let start = find_pair(&self.buffer, FRAME_HEADER)?;
        if start > 0 {
            let junk = self.buffer.split_to(start);
            tracing::trace!("dropping {} bytes of pre-header noise", junk.len());
        }

        // The footer search begins past the header pair, so a stray footer
        // earlier in the buffer can never truncate the frame.
        let footer = find_pair(&self.buffer[2..], FRAME_FOOTER)?;
        Some(self.buffer.split_to(footer + 4))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn find_pair(haystack: &[u8], needle: [u8; 2]) -> Option<usize> {
    haystack
        .windows(2)
        .position(|w| w[0] == needle[0] && w[1] == needle[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x25]).unwrap();

        let frames = scanner.push(&frame);

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
        assert!(scanner.is_empty());
    }

    #[test]
    fn test_garbage_before_header_is_dropped() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x25]).unwrap();

        let mut data = vec![0xff, 0x00, 0x42];
        data.extend_from_slice(&frame);

        let frames = scanner.push(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
        assert!(scanner.is_empty());
    }

    #[test]
    fn test_stray_footer_before_header_is_ignored() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x25]).unwrap();

        // A footer pair in the junk must not end the frame early.
        let mut data = vec![0x10, 0x03, 0xaa];
        data.extend_from_slice(&frame);

        let frames = scanner.push(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[test]
    fn test_incomplete_frame_waits_for_more_input() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x25, 0x07]).unwrap();

        let frames = scanner.push(&frame[..4]);
        assert!(frames.is_empty());
        assert_eq!(scanner.len(), 4);

        let frames = scanner.push(&frame[4..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[test]
    fn test_garbage_dropped_while_waiting_for_footer() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x25]).unwrap();

        // Junk plus an unfinished frame: the junk goes, the fragment stays.
        let mut data = vec![0x55, 0xaa];
        data.extend_from_slice(&frame[..3]);
        let frames = scanner.push(&data);
        assert!(frames.is_empty());
        assert_eq!(scanner.len(), 3);

        let frames = scanner.push(&frame[3..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut scanner = FrameScanner::new();
        let frame1 = build_frame(&[0x68, 0x00]).unwrap();
        let frame2 = build_frame(&[0x42, 0x25, 0x01]).unwrap();

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2);

        let frames = scanner.push(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], &frame1[..]);
        assert_eq!(&frames[1][..], &frame2[..]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut scanner = FrameScanner::new();
        let frame = build_frame(&[0x68, 0x10, 0xbe, 0x10]).unwrap();

        let mut all_frames = Vec::new();
        for byte in &frame {
            all_frames.extend(scanner.push(&[*byte]));
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], &frame[..]);
    }

    #[test]
    fn test_escaped_bytes_do_not_break_scanning() {
        let mut scanner = FrameScanner::new();
        // Checksum 0x10 gets stuffed; the scanner must not take the escape
        // pair followed by the footer's 0x10 as anything but content.
        let frame = build_frame(&[0x68, 0x96]).unwrap();

        let frames = scanner.push(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[test]
    fn test_pure_garbage_is_kept_until_a_header_shows() {
        let mut scanner = FrameScanner::new();

        let frames = scanner.push(&[0x01, 0x02, 0x03, 0x04]);
        assert!(frames.is_empty());
        assert_eq!(scanner.len(), 4);
    }
}
