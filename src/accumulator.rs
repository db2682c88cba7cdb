//! Response accumulation
//!
//! RTU responses arrive in arbitrary chunks, one or two bytes at a time
//! at low baud rates. The accumulator buffers what has arrived and works
//! out how many bytes the complete frame will have, which is only
//! knowable once the first three bytes (unit, function code, and either
//! the exception code or the byte count) are in hand.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::constants::*;

/// Lifecycle of a single transaction on the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// No transaction in flight
    Idle,
    /// Request is being transmitted; inbound bytes are not expected yet
    Sending,
    /// Fewer than three bytes buffered; frame length still unknown
    AwaitingFirstBytes,
    /// Frame length determined; waiting for the remaining bytes
    LengthKnown(usize),
    /// A complete frame is buffered
    Complete,
    /// The deadline expired before the frame completed
    TimedOut,
}

/// Accumulates inbound bytes until a complete response frame is buffered
#[derive(Debug)]
pub struct ResponseAccumulator {
    buffer: BytesMut,
    state: AccumulatorState,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(RESPONSE_BUFFER_SIZE),
            state: AccumulatorState::Idle,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Bytes buffered so far
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Arm for a new transaction, discarding any previous contents
    pub fn begin(&mut self) {
        self.buffer.clear();
        self.state = AccumulatorState::Sending;
    }

    /// Transmission finished; inbound bytes are now expected
    pub fn await_response(&mut self) {
        self.state = AccumulatorState::AwaitingFirstBytes;
    }

    /// Mark the transaction as expired
    pub fn expire(&mut self) {
        self.state = AccumulatorState::TimedOut;
    }

    /// Feed a chunk of inbound bytes and return the resulting state.
    ///
    /// Once the expected length has been determined it never changes:
    /// the function code and byte count of an RTU frame are fixed by its
    /// first three bytes.
    pub fn push(&mut self, chunk: &[u8]) -> AccumulatorState {
        self.buffer.put_slice(chunk);

        if let AccumulatorState::AwaitingFirstBytes = self.state {
            if let Some(len) = self.expected_len() {
                trace!(expected = len, buffered = self.buffer.len(), "frame length known");
                self.state = AccumulatorState::LengthKnown(len);
            }
        }

        if let AccumulatorState::LengthKnown(len) = self.state {
            if self.buffer.len() >= len {
                self.state = AccumulatorState::Complete;
            }
        }

        self.state
    }

    /// Take the completed frame, truncated to the expected length, and
    /// return the accumulator to idle. Bytes beyond the frame are bus
    /// noise and are dropped.
    pub fn take_frame(&mut self) -> Vec<u8> {
        let len = match self.expected_len() {
            Some(len) => len.min(self.buffer.len()),
            None => self.buffer.len(),
        };
        let frame = self.buffer[..len].to_vec();
        self.buffer.clear();
        self.state = AccumulatorState::Idle;
        frame
    }

    /// Expected total frame length, or `None` while undeterminable.
    ///
    /// Needs at least three buffered bytes. An unrecognized function
    /// code stays `None`: the frame cannot be sized, so the transaction
    /// runs out its deadline instead of misreading the stream.
    fn expected_len(&self) -> Option<usize> {
        if self.buffer.len() < READ_HEADER_LEN {
            return None;
        }

        let fc = self.buffer[1];

        if fc & EXCEPTION_FLAG != 0 {
            return Some(EXCEPTION_FRAME_LEN);
        }

        match fc {
            FC_READ_COILS
            | FC_READ_DISCRETE_INPUTS
            | FC_READ_HOLDING_REGISTERS
            | FC_READ_INPUT_REGISTERS => {
                Some(READ_HEADER_LEN + self.buffer[2] as usize + CRC_LEN)
            }
            FC_WRITE_SINGLE_COIL
            | FC_WRITE_SINGLE_REGISTER
            | FC_WRITE_MULTIPLE_COILS
            | FC_WRITE_MULTIPLE_REGISTERS => Some(WRITE_ECHO_FRAME_LEN),
            _ => None,
        }
    }
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> ResponseAccumulator {
        let mut acc = ResponseAccumulator::new();
        acc.begin();
        acc.await_response();
        acc
    }

    #[test]
    fn test_length_unknown_below_three_bytes() {
        let mut acc = armed();
        assert_eq!(acc.push(&[0x03]), AccumulatorState::AwaitingFirstBytes);
        assert_eq!(acc.push(&[0x03]), AccumulatorState::AwaitingFirstBytes);
    }

    #[test]
    fn test_read_response_length_from_byte_count() {
        let mut acc = armed();
        acc.push(&[0x03, 0x03, 0x04]);
        assert_eq!(acc.state(), AccumulatorState::LengthKnown(9));

        acc.push(&[0x12, 0x34, 0xAB, 0xCD, 0x00]);
        assert_eq!(acc.state(), AccumulatorState::LengthKnown(9));
        assert_eq!(acc.push(&[0x00]), AccumulatorState::Complete);
    }

    #[test]
    fn test_write_echo_fixed_length() {
        let mut acc = armed();
        acc.push(&[0x03, 0x06, 0x00]);
        assert_eq!(acc.state(), AccumulatorState::LengthKnown(8));

        acc.push(&[0x10, 0x12, 0x34, 0x00, 0x00]);
        assert_eq!(acc.state(), AccumulatorState::Complete);
    }

    #[test]
    fn test_exception_fixed_length() {
        let mut acc = armed();
        acc.push(&[0x03, 0x83]);
        assert_eq!(acc.state(), AccumulatorState::AwaitingFirstBytes);
        acc.push(&[0x02, 0x00]);
        assert_eq!(acc.state(), AccumulatorState::LengthKnown(5));
        assert_eq!(acc.push(&[0x00]), AccumulatorState::Complete);
    }

    #[test]
    fn test_unknown_function_code_never_sizes() {
        let mut acc = armed();
        acc.push(&[0x03, 0x55, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(acc.state(), AccumulatorState::AwaitingFirstBytes);
    }

    #[test]
    fn test_single_chunk_complete() {
        let mut acc = armed();
        let state = acc.push(&[0x03, 0x06, 0x00, 0x10, 0x12, 0x34, 0xAA, 0xBB]);
        assert_eq!(state, AccumulatorState::Complete);
    }

    #[test]
    fn test_take_frame_drops_trailing_noise() {
        let mut acc = armed();
        acc.push(&[0x03, 0x06, 0x00, 0x10, 0x12, 0x34, 0xAA, 0xBB, 0xFF, 0xFF]);
        assert_eq!(acc.state(), AccumulatorState::Complete);
        let frame = acc.take_frame();
        assert_eq!(frame.len(), 8);
        assert_eq!(acc.state(), AccumulatorState::Idle);
        assert!(acc.buffered().is_empty());
    }

    #[test]
    fn test_begin_discards_stale_bytes() {
        let mut acc = armed();
        acc.push(&[0x03, 0x03]);
        acc.expire();
        assert_eq!(acc.state(), AccumulatorState::TimedOut);

        acc.begin();
        assert!(acc.buffered().is_empty());
        assert_eq!(acc.state(), AccumulatorState::Sending);
    }
}
