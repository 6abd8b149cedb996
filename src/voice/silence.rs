//! Energy-based silence auto-stop.

use std::time::Duration;

/// Mean absolute amplitude of a chunk. Empty chunks have zero energy.
pub fn energy(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|s| s.abs()).sum();
    sum / chunk.len() as f32
}

/// Fires once per recording session after the signal has stayed below the
/// threshold for the configured duration without interruption.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold: f32,
    timeout_samples: usize,
    silent_run: usize,
    fired: bool,
}

impl SilenceDetector {
    pub fn new(threshold: f32, timeout: Duration, sample_rate: u32) -> Self {
        let timeout_samples = (timeout.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self {
            threshold,
            timeout_samples: timeout_samples.max(1),
            silent_run: 0,
            fired: false,
        }
    }

    /// Feed one chunk. Returns `true` exactly once, on the chunk that
    /// completes the silent stretch.
    pub fn observe(&mut self, chunk: &[f32]) -> bool {
        if self.fired || chunk.is_empty() {
            return false;
        }
        if energy(chunk) < self.threshold {
            self.silent_run += chunk.len();
        } else {
            self.silent_run = 0;
        }
        if self.silent_run >= self.timeout_samples {
            self.fired = true;
        }
        self.fired
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Start a new session.
    pub fn reset(&mut self) {
        self.silent_run = 0;
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn silence(n: usize) -> Vec<f32> {
        vec![0.001; n]
    }

    fn speech(n: usize) -> Vec<f32> {
        (0..n).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect()
    }

    #[test]
    fn energy_is_mean_abs() {
        assert_eq!(energy(&[]), 0.0);
        assert!((energy(&[0.5, -0.5, 0.0, 1.0]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fires_after_continuous_silence() {
        let mut det = SilenceDetector::new(0.01, Duration::from_millis(200), RATE);
        // 200 ms = 3200 samples; chunks of 1280.
        assert!(!det.observe(&silence(1280)));
        assert!(!det.observe(&silence(1280)));
        assert!(det.observe(&silence(1280)));
        assert!(det.has_fired());
    }

    #[test]
    fn speech_resets_the_run() {
        let mut det = SilenceDetector::new(0.01, Duration::from_millis(200), RATE);
        assert!(!det.observe(&silence(2560)));
        assert!(!det.observe(&speech(1280)));
        assert!(!det.observe(&silence(2560)));
        assert!(det.observe(&silence(1280)));
    }

    #[test]
    fn fires_once_per_session() {
        let mut det = SilenceDetector::new(0.01, Duration::from_millis(100), RATE);
        assert!(det.observe(&silence(1600)));
        assert!(!det.observe(&silence(1600)));
        det.reset();
        assert!(!det.has_fired());
        assert!(det.observe(&silence(1600)));
    }
}
