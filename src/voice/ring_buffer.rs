//! Lock-free SPSC ring buffer between the cpal callback and the engine loop.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// ~10 seconds of 16 kHz mono audio.
const DEFAULT_CAPACITY: usize = 160_000;

/// Producer half, owned by the cpal audio callback.
pub struct SampleProducer {
    inner: ringbuf::HeapProd<f32>,
}

/// Consumer half, drained by the engine loop.
pub struct SampleConsumer {
    inner: ringbuf::HeapCons<f32>,
}

pub fn sample_ring_buffer(capacity: Option<usize>) -> (SampleProducer, SampleConsumer) {
    let rb = HeapRb::<f32>::new(capacity.unwrap_or(DEFAULT_CAPACITY));
    let (prod, cons) = rb.split();
    (SampleProducer { inner: prod }, SampleConsumer { inner: cons })
}

impl SampleProducer {
    /// Returns how many samples fit; the rest are dropped.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }
}

impl SampleConsumer {
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Take everything currently buffered.
    pub fn drain_all(&mut self) -> Vec<f32> {
        let n = self.available();
        let mut buf = vec![0.0f32; n];
        let read = self.inner.pop_slice(&mut buf);
        buf.truncate(read);
        buf
    }
}
