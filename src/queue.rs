//! Outbound frame queue.
//!
//! The bus is strictly half duplex with a single master, so at most one
//! request may be on the wire awaiting its reply. Requests are queued in
//! FIFO order; the engine transmits the head, waits for the reply or the
//! response deadline, then moves to the next. A pending frame lives from
//! enqueue until its transaction completes or times out.

use std::collections::VecDeque;

use crate::error::BusError;
use crate::protocol::MAX_FRAME_LEN;

/// Maximum queued frames before enqueue refuses.
///
/// A full probe sweep plus a work sweep across a full slave table stays
/// far below this; hitting the cap means a slave implementation is
/// flooding the bus.
pub const MAX_QUEUE_DEPTH: usize = 64;

/// A framed request waiting for its turn on the wire.
#[derive(Debug, Clone)]
pub struct PendingFrame {
    addr: u8,
    bytes: Vec<u8>,
}

impl PendingFrame {
    /// Destination slave address, taken from the request payload.
    #[inline]
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// The complete on-wire frame, delimiters included.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// FIFO of pending outbound frames.
#[derive(Debug, Default)]
pub struct TransmitQueue {
    frames: VecDeque<PendingFrame>,
}

impl TransmitQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a framed request for the given slave address.
    ///
    /// # Errors
    ///
    /// [`BusError::OversizedFrame`] if the frame exceeds the on-wire
    /// transmit buffer, [`BusError::QueueFull`] at [`MAX_QUEUE_DEPTH`].
    pub fn enqueue(&mut self, addr: u8, frame: Vec<u8>) -> Result<(), BusError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(BusError::OversizedFrame(frame.len()));
        }
        if self.frames.len() >= MAX_QUEUE_DEPTH {
            return Err(BusError::QueueFull);
        }

        self.frames.push_back(PendingFrame { addr, bytes: frame });
        Ok(())
    }

    /// The frame whose transaction is currently in progress, if any.
    #[inline]
    pub fn head(&self) -> Option<&PendingFrame> {
        self.frames.front()
    }

    /// Remove and return the head frame, ending its transaction.
    pub fn pop_head(&mut self) -> Option<PendingFrame> {
        self.frames.pop_front()
    }

    /// Number of queued frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    fn probe(addr: u8) -> Vec<u8> {
        build_frame(&[addr, 0x00]).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TransmitQueue::new();
        queue.enqueue(0x11, probe(0x11)).unwrap();
        queue.enqueue(0x22, probe(0x22)).unwrap();
        queue.enqueue(0x33, probe(0x33)).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.head().unwrap().addr(), 0x11);
        assert_eq!(queue.pop_head().unwrap().addr(), 0x11);
        assert_eq!(queue.pop_head().unwrap().addr(), 0x22);
        assert_eq!(queue.pop_head().unwrap().addr(), 0x33);
        assert!(queue.pop_head().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_head_is_not_consumed_by_peeking() {
        let mut queue = TransmitQueue::new();
        queue.enqueue(0x68, probe(0x68)).unwrap();

        assert_eq!(queue.head().unwrap().addr(), 0x68);
        assert_eq!(queue.head().unwrap().addr(), 0x68);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_oversized_frame_is_refused() {
        let mut queue = TransmitQueue::new();
        let result = queue.enqueue(0x68, vec![0u8; MAX_FRAME_LEN + 1]);
        assert!(matches!(result, Err(BusError::OversizedFrame(33))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_depth_cap_is_enforced() {
        let mut queue = TransmitQueue::new();
        for _ in 0..MAX_QUEUE_DEPTH {
            queue.enqueue(0x68, probe(0x68)).unwrap();
        }

        let result = queue.enqueue(0x68, probe(0x68));
        assert!(matches!(result, Err(BusError::QueueFull)));
        assert_eq!(queue.len(), MAX_QUEUE_DEPTH);
    }

    #[test]
    fn test_frame_bytes_survive_queueing() {
        let mut queue = TransmitQueue::new();
        let frame = probe(0x68);
        queue.enqueue(0x68, frame.clone()).unwrap();

        assert_eq!(queue.head().unwrap().bytes(), &frame[..]);
    }
}
