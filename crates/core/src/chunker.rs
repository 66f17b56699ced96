//! Fixed-size audio framing for the agent connection.

use bytes::{Bytes, BytesMut};
use std::num::NonZeroUsize;

/// Mulaw samples (one byte each) in a 20 ms telephony packet at 8 kHz.
pub const SAMPLES_PER_PACKET: usize = 160;
/// Telephony packets grouped into one agent frame (400 ms of audio).
pub const PACKETS_PER_FRAME: usize = 20;
/// Default agent frame length in bytes.
pub const DEFAULT_CHUNK_LEN: usize = PACKETS_PER_FRAME * SAMPLES_PER_PACKET;

/// Accumulates inbound caller audio and slices it into equal frames.
///
/// Bytes leave the accumulator in the order they arrived. Between drains at
/// most `chunk_len - 1` bytes are retained.
#[derive(Debug)]
pub struct AudioChunker {
    buffer: BytesMut,
    chunk_len: NonZeroUsize,
}

impl AudioChunker {
    pub fn new(chunk_len: NonZeroUsize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(chunk_len.get() * 2),
            chunk_len,
        }
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len.get()
    }

    /// Appends received audio to the accumulator.
    pub fn feed(&mut self, audio: &[u8]) {
        self.buffer.extend_from_slice(audio);
    }

    /// Removes every complete frame from the front of the accumulator.
    ///
    /// The iterator is lazy: frames not pulled from it stay buffered.
    pub fn drain(&mut self) -> impl Iterator<Item = Bytes> + '_ {
        let chunk_len = self.chunk_len.get();
        std::iter::from_fn(move || {
            (self.buffer.len() >= chunk_len).then(|| self.buffer.split_to(chunk_len).freeze())
        })
    }

    /// Bytes waiting for a frame to fill up.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    /// Discards buffered audio.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for AudioChunker {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CHUNK_LEN).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn default_frame_is_twenty_packets() {
        assert_eq!(AudioChunker::default().chunk_len(), 3200);
    }

    #[test]
    fn exact_chunk_yields_one_frame() {
        let input = bytes(3200);
        let mut chunker = AudioChunker::default();
        chunker.feed(&input);

        let frames: Vec<Bytes> = chunker.drain().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), input.as_slice());
        assert!(chunker.remainder().is_empty());
    }

    #[test]
    fn split_feed_yields_same_frame() {
        let input = bytes(3200);
        let mut chunker = AudioChunker::default();

        chunker.feed(&input[..3199]);
        assert_eq!(chunker.drain().count(), 0);
        assert_eq!(chunker.remainder().len(), 3199);

        chunker.feed(&input[3199..]);
        let frames: Vec<Bytes> = chunker.drain().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), input.as_slice());
        assert!(chunker.remainder().is_empty());
    }

    #[test]
    fn remainder_is_retained_for_the_next_frame() {
        let input = bytes(6399);
        let mut chunker = AudioChunker::default();
        chunker.feed(&input);

        let frames: Vec<Bytes> = chunker.drain().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &input[..3200]);
        assert_eq!(chunker.remainder(), &input[3200..]);
        assert_eq!(chunker.remainder().len(), 3199);
    }

    #[test]
    fn undrained_frames_stay_buffered() {
        let mut chunker = AudioChunker::new(NonZeroUsize::new(4).unwrap());
        chunker.feed(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let first = chunker.drain().next().unwrap();
        assert_eq!(first.as_ref(), &[1, 2, 3, 4]);
        assert_eq!(chunker.remainder(), &[5, 6, 7, 8, 9]);

        chunker.clear();
        assert!(chunker.remainder().is_empty());
    }

    #[test]
    fn random_splits_preserve_order_and_remainder() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let chunk_len = rng.random_range(1..=512);
            let mut chunker = AudioChunker::new(NonZeroUsize::new(chunk_len).unwrap());
            let mut input = Vec::new();
            let mut emitted = Vec::new();
            let mut frame_count = 0;

            for _ in 0..rng.random_range(0..40) {
                let mut run = vec![0u8; rng.random_range(0..700)];
                rng.fill(&mut run[..]);
                input.extend_from_slice(&run);
                chunker.feed(&run);

                for frame in chunker.drain() {
                    assert_eq!(frame.len(), chunk_len);
                    emitted.extend_from_slice(&frame);
                    frame_count += 1;
                }
                assert!(chunker.remainder().len() < chunk_len);
            }

            let n = input.len();
            assert_eq!(frame_count, n / chunk_len);
            assert_eq!(emitted.len(), n - n % chunk_len);
            assert_eq!(emitted.as_slice(), &input[..emitted.len()]);
            assert_eq!(chunker.remainder(), &input[emitted.len()..]);
        }
    }
}
