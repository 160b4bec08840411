//! Lock-free SPSC ring buffer for PCM samples.
//!
//! Uses the `ringbuf` crate to pass signed-16-bit audio samples from the
//! cpal capture callback thread to the Dialog Controller without locks.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// Default capacity: ~10 seconds of 16 kHz mono audio.
const DEFAULT_CAPACITY: usize = 160_000;

/// Producer half — lives in the cpal audio callback thread.
pub struct AudioProducer {
    inner: ringbuf::HeapProd<i16>,
}

/// Consumer half — lives in the Audio Source side the controller pulls from.
pub struct AudioConsumer {
    inner: ringbuf::HeapCons<i16>,
}

/// Create a matched producer/consumer pair backed by a lock-free ring buffer.
pub fn audio_ring_buffer(capacity: Option<usize>) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.unwrap_or(DEFAULT_CAPACITY);
    let rb = HeapRb::<i16>::new(cap);
    let (prod, cons) = rb.split();
    (AudioProducer { inner: prod }, AudioConsumer { inner: cons })
}

impl AudioProducer {
    /// Push a slice of samples into the ring buffer. Returns the number of
    /// samples actually written (may be less than `samples.len()` if full).
    pub fn push_slice(&mut self, samples: &[i16]) -> usize {
        self.inner.push_slice(samples)
    }
}

// SAFETY: the ringbuf producer is used from a single thread (the cpal
// callback runs on its own dedicated audio thread).
unsafe impl Send for AudioProducer {}

impl AudioConsumer {
    /// Pop up to `buf.len()` samples from the ring buffer into `buf`.
    /// Returns the number of samples actually read.
    pub fn pop_slice(&mut self, buf: &mut [i16]) -> usize {
        self.inner.pop_slice(buf)
    }

    /// Number of samples currently available for reading.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Drain all available samples into a Vec, discarding them without
    /// processing — used to purge audio accumulated while Idle (spec
    /// §4.11 "On enter Listening").
    pub fn drain_all(&mut self) -> Vec<i16> {
        let n = self.available();
        if n == 0 {
            return Vec::new();
        }
        let mut buf = vec![0i16; n];
        let read = self.pop_slice(&mut buf);
        buf.truncate(read);
        buf
    }
}

unsafe impl Send for AudioConsumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip() {
        let (mut prod, mut cons) = audio_ring_buffer(Some(16));
        prod.push_slice(&[1, 2, 3, 4]);
        let mut out = [0i16; 4];
        assert_eq!(cons.pop_slice(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn drain_all_empties_buffer() {
        let (mut prod, mut cons) = audio_ring_buffer(Some(16));
        prod.push_slice(&[5, 6, 7]);
        let drained = cons.drain_all();
        assert_eq!(drained, vec![5, 6, 7]);
        assert_eq!(cons.available(), 0);
    }
}
