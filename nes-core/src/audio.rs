use bincode::{Decode, Encode};

// 236.25MHz / 11 / 12
const NES_CPU_FREQUENCY: f64 = 1_789_772.727_272_727_3;

const OUTPUT_FREQUENCY: f64 = 44_100.0;

// The host drains the queue once per frame; one frame is ~735 samples at
// 44.1kHz, so 1024 bounds the queue without ever dropping samples in normal
// operation.
const MAX_QUEUED_SAMPLES: usize = 1024;

/// Divides the CPU clock down to the host output rate, carrying the
/// fractional remainder so the long-run average stays exact.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct SampleClock {
    elapsed: f64,
    period: f64,
}

impl SampleClock {
    pub(crate) fn new() -> Self {
        Self { elapsed: 0.0, period: NES_CPU_FREQUENCY / OUTPUT_FREQUENCY }
    }

    /// Advance by one CPU cycle; returns true when an output sample is due.
    pub(crate) fn tick(&mut self) -> bool {
        self.elapsed += 1.0;
        if self.elapsed >= self.period {
            self.elapsed -= self.period;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct SampleQueue {
    samples: Vec<f32>,
}

impl SampleQueue {
    pub(crate) fn new() -> Self {
        Self { samples: Vec::with_capacity(MAX_QUEUED_SAMPLES) }
    }

    pub(crate) fn push(&mut self, sample: f32) {
        if self.samples.len() < MAX_QUEUED_SAMPLES {
            self.samples.push(sample);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Hand the queued samples to the caller and clear the queue.
    pub(crate) fn drain(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clock_average_rate() {
        let mut clock = SampleClock::new();

        let mut samples = 0;
        for _ in 0..1_789_773 {
            if clock.tick() {
                samples += 1;
            }
        }

        // One emulated second should produce one second of output +/- one
        // sample of rounding.
        assert!((samples as i64 - 44_100).abs() <= 1, "samples = {samples}");
    }

    #[test]
    fn sample_queue_bounded() {
        let mut queue = SampleQueue::new();
        for _ in 0..MAX_QUEUED_SAMPLES + 100 {
            queue.push(0.25);
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), MAX_QUEUED_SAMPLES);
        assert!(queue.is_empty());
    }
}
