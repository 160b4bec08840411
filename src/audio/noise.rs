//! Adaptive Noise Estimator (spec §4.3, C3).
//!
//! Tracks a rolling window of recent frame RMS values and derives a speech
//! threshold from them. The floor is advisory only — the Endpointer and
//! Barge-in Watcher both share one instance of this estimator so their
//! tuning never drifts apart (spec §4.10).

use std::collections::VecDeque;
use std::time::Instant;

/// RMS of a signed-16-bit frame, normalized to [-1, 1] before squaring
/// (spec §4.3).
pub fn rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame
        .iter()
        .map(|&s| {
            let norm = s as f64 / i16::MAX as f64;
            norm * norm
        })
        .sum();
    ((sum_sq / frame.len() as f64).sqrt()) as f32
}

pub struct NoiseEstimator {
    window: VecDeque<f32>,
    window_size: usize,
    base_threshold: f32,
    adaptation_factor: f32,
    reset_interval: std::time::Duration,
    last_reset: Instant,
}

impl NoiseEstimator {
    pub fn new(
        window_size: usize,
        base_threshold: f32,
        adaptation_factor: f32,
        reset_interval_secs: u64,
    ) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            base_threshold,
            adaptation_factor,
            reset_interval: std::time::Duration::from_secs(reset_interval_secs),
            last_reset: Instant::now(),
        }
    }

    /// Appends the RMS of `frame` to the ring; clears the ring if the reset
    /// interval has elapsed since the last reset (spec §4.3).
    pub fn update(&mut self, frame: &[i16]) {
        if self.last_reset.elapsed() > self.reset_interval {
            self.window.clear();
            self.last_reset = Instant::now();
        }
        if self.window.len() >= self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(rms(frame));
    }

    /// `max(base, mean(ring) * factor)` if the ring is non-empty, else base.
    pub fn threshold(&self) -> f32 {
        if self.window.is_empty() {
            return self.base_threshold;
        }
        let mean: f32 = self.window.iter().sum::<f32>() / self.window.len() as f32;
        self.base_threshold.max(mean * self.adaptation_factor)
    }

    /// Explicit environment-change reset (spec §3 NoiseModel).
    pub fn force_reset(&mut self) {
        self.window.clear();
        self.last_reset = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_returns_base_threshold() {
        let est = NoiseEstimator::new(10, 0.02, 1.5, 300);
        assert_eq!(est.threshold(), 0.02);
    }

    #[test]
    fn threshold_tracks_adapted_mean_above_base() {
        let mut est = NoiseEstimator::new(10, 0.001, 1.5, 300);
        let loud_frame: Vec<i16> = vec![i16::MAX / 2; 512];
        for _ in 0..10 {
            est.update(&loud_frame);
        }
        let t = est.threshold();
        assert!(t > 0.001, "threshold should rise above the tiny base: {t}");
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0i16; 100]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_near_one() {
        let frame = vec![i16::MAX; 100];
        let r = rms(&frame);
        assert!((r - 1.0).abs() < 0.01);
    }
}
