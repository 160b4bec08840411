//! Barge-in Watcher (spec §4.10, C10).
//!
//! Active only while the Dialog Controller is in Speaking. Samples every
//! k-th frame from the Audio Source; on confirmed speech, stops the sink and
//! hands captured frames to a fresh UtteranceBuffer for the next Listening
//! turn. Shares the Adaptive Noise Estimator with the Endpointer (spec: "to
//! avoid double-tuning drift").

use std::time::Duration;

use crate::audio::noise::{rms, NoiseEstimator};
use crate::dialog::state::UtteranceBuffer;

pub struct BargeInConfig {
    pub stride: usize,
    pub max_record_duration: Duration,
    pub silence_run_to_stop: u32,
    pub min_frames_before_silence_check: u32,
}

impl Default for BargeInConfig {
    fn default() -> Self {
        Self {
            stride: 10,
            max_record_duration: Duration::from_secs(2),
            silence_run_to_stop: 10,
            min_frames_before_silence_check: 10,
        }
    }
}

pub enum BargeInTick {
    /// Not this frame's turn to sample, or no speech detected yet.
    Idle,
    /// Speech confirmed: caller must stop the sink and switch to Listening
    /// with the returned seeded buffer.
    Confirmed(UtteranceBuffer),
}

pub struct BargeInWatcher {
    cfg: BargeInConfig,
    frame_counter: u64,
    recording: Option<RecordingState>,
}

struct RecordingState {
    buffer: UtteranceBuffer,
    frames_recorded: u32,
    silence_run: u32,
    elapsed: Duration,
}

impl BargeInWatcher {
    pub fn new(cfg: BargeInConfig) -> Self {
        Self { cfg, frame_counter: 0, recording: None }
    }

    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.recording = None;
    }

    /// Feed one frame from the Audio Source. `frame_duration` is how much
    /// wall-clock time this frame represents, for the bounded-duration rule.
    pub fn tick(
        &mut self,
        frame: &[i16],
        noise: &NoiseEstimator,
        frame_duration: Duration,
        sample_rate: u32,
        frame_len: usize,
    ) -> BargeInTick {
        if let Some(rec) = &mut self.recording {
            rec.buffer.push(frame.to_vec());
            rec.frames_recorded += 1;
            rec.elapsed += frame_duration;

            let above = rms(frame) >= noise.threshold();
            if above {
                rec.silence_run = 0;
            } else {
                rec.silence_run += 1;
            }

            let silence_met = rec.frames_recorded >= self.cfg.min_frames_before_silence_check
                && rec.silence_run >= self.cfg.silence_run_to_stop;
            let duration_met = rec.elapsed >= self.cfg.max_record_duration;

            if silence_met || duration_met {
                let rec = self.recording.take().unwrap();
                return BargeInTick::Confirmed(rec.buffer);
            }
            return BargeInTick::Idle;
        }

        self.frame_counter += 1;
        if self.frame_counter % self.cfg.stride as u64 != 0 {
            return BargeInTick::Idle;
        }

        if rms(frame) >= noise.threshold() {
            let mut buffer = UtteranceBuffer::new(
                self.cfg.max_record_duration.as_secs_f64() + 1.0,
                sample_rate,
                frame_len,
            );
            buffer.push(frame.to_vec());
            self.recording = Some(RecordingState {
                buffer,
                frames_recorded: 1,
                silence_run: 0,
                elapsed: frame_duration,
            });
        }

        BargeInTick::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud() -> Vec<i16> {
        vec![i16::MAX / 2; 64]
    }
    fn silent() -> Vec<i16> {
        vec![0i16; 64]
    }

    #[test]
    fn only_samples_every_stride_frames() {
        let mut watcher = BargeInWatcher::new(BargeInConfig { stride: 3, ..Default::default() });
        let noise = NoiseEstimator::new(50, 0.01, 1.5, 30);
        let d = Duration::from_millis(20);
        for _ in 0..2 {
            assert!(matches!(
                watcher.tick(&loud(), &noise, d, 16_000, 64),
                BargeInTick::Idle
            ));
        }
        assert!(!watcher.is_recording());
    }

    #[test]
    fn confirmed_speech_starts_recording_and_max_duration_stops_it() {
        let mut watcher = BargeInWatcher::new(BargeInConfig {
            stride: 1,
            max_record_duration: Duration::from_millis(40),
            ..Default::default()
        });
        let noise = NoiseEstimator::new(50, 0.01, 1.5, 30);
        let d = Duration::from_millis(20);
        watcher.tick(&loud(), &noise, d, 16_000, 64);
        assert!(watcher.is_recording());
        let result = watcher.tick(&loud(), &noise, d, 16_000, 64);
        assert!(matches!(result, BargeInTick::Confirmed(_)));
        assert!(!watcher.is_recording());
    }

    #[test]
    fn silence_run_stops_recording_early() {
        let mut watcher = BargeInWatcher::new(BargeInConfig {
            stride: 1,
            max_record_duration: Duration::from_secs(10),
            silence_run_to_stop: 2,
            min_frames_before_silence_check: 1,
        });
        let noise = NoiseEstimator::new(50, 0.01, 1.5, 30);
        let d = Duration::from_millis(20);
        watcher.tick(&loud(), &noise, d, 16_000, 64);
        watcher.tick(&silent(), &noise, d, 16_000, 64);
        let result = watcher.tick(&silent(), &noise, d, 16_000, 64);
        assert!(matches!(result, BargeInTick::Confirmed(_)));
    }
}
