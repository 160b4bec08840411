//! Endpointer (spec §4.5, C5).
//!
//! Decides utterance start/end from per-frame energy against the adaptive
//! threshold plus timing rules. Does not itself transition Dialog Controller
//! states; returns a decision each frame for the controller to act on.

use std::time::{Duration, Instant};

use crate::audio::noise::rms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    EndWithAudio,
    EndEmpty,
}

pub struct EndpointerConfig {
    pub min_speech_duration: Duration,
    pub onset_frames: u32,
    pub trailing_silence: Duration,
    pub hard_max: Duration,
    pub idle_timeout: Duration,
}

impl Default for EndpointerConfig {
    fn default() -> Self {
        Self {
            min_speech_duration: Duration::from_millis(300),
            onset_frames: 3,
            trailing_silence: Duration::from_secs_f64(2.0),
            hard_max: Duration::from_secs_f64(10.0),
            idle_timeout: Duration::from_secs_f64(15.0),
        }
    }
}

pub struct Endpointer {
    cfg: EndpointerConfig,
    above_threshold_run: u32,
    onset_accepted: bool,
    onset_at: Option<Instant>,
    silence_since: Option<Instant>,
    listening_since: Instant,
    in_conversation: bool,
    turn_count: u32,
}

impl Endpointer {
    pub fn new(cfg: EndpointerConfig) -> Self {
        Self {
            cfg,
            above_threshold_run: 0,
            onset_accepted: false,
            onset_at: None,
            silence_since: None,
            listening_since: Instant::now(),
            in_conversation: false,
            turn_count: 1,
        }
    }

    /// Reset onset/silence state at Listening entry (spec §4.11).
    /// `in_conversation`/`turn_count` gate the idle_timeout no-onset rule
    /// (rule 3): it only fires in a continued multi-turn session, never on
    /// a first turn.
    pub fn reset(&mut self, in_conversation: bool, turn_count: u32) {
        self.above_threshold_run = 0;
        self.onset_accepted = false;
        self.onset_at = None;
        self.silence_since = None;
        self.listening_since = Instant::now();
        self.in_conversation = in_conversation;
        self.turn_count = turn_count;
    }

    /// Feed one frame, returning the endpointing decision (spec §4.5 rules
    /// 1-4). `threshold` comes from the shared Adaptive Noise Estimator.
    pub fn feed(&mut self, frame: &[i16], threshold: f32, now: Instant) -> Decision {
        let energy = rms(frame);
        let above = energy >= threshold;

        if above {
            self.above_threshold_run += 1;
            self.silence_since = None;
            if !self.onset_accepted && self.above_threshold_run >= self.cfg.onset_frames {
                self.onset_accepted = true;
                self.onset_at = Some(now);
            }
        } else {
            self.above_threshold_run = 0;
            if self.onset_accepted {
                let silence_start = *self.silence_since.get_or_insert(now);
                if now.duration_since(silence_start) >= self.cfg.trailing_silence {
                    return self.end_turn(now);
                }
            }
        }

        // Rule 1: hard_max always ends the turn with whatever audio was
        // captured, regardless of onset state — unlike the trailing-silence
        // path below, this never discards as a transient and never falls
        // back to EndEmpty.
        if now.duration_since(self.listening_since) >= self.cfg.hard_max {
            return Decision::EndWithAudio;
        }

        // Rule 3: idle_timeout with no onset only ends the turn in a
        // continued multi-turn conversation; a first turn just keeps
        // listening until hard_max.
        if !self.onset_accepted
            && self.in_conversation
            && self.turn_count > 1
            && now.duration_since(self.listening_since) >= self.cfg.idle_timeout
        {
            return Decision::EndEmpty;
        }

        Decision::Continue
    }

    fn end_turn(&mut self, now: Instant) -> Decision {
        let decision = if self.onset_accepted {
            let onset = self.onset_at.unwrap_or(now);
            let speech_len = now.duration_since(onset);
            if speech_len >= self.cfg.min_speech_duration {
                Decision::EndWithAudio
            } else {
                // Transient: discard and keep listening (rule 4).
                self.onset_accepted = false;
                self.onset_at = None;
                self.silence_since = None;
                return Decision::Continue;
            }
        } else {
            Decision::EndEmpty
        };
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loud_frame() -> Vec<i16> {
        vec![i16::MAX / 2; 64]
    }

    fn silent_frame() -> Vec<i16> {
        vec![0i16; 64]
    }

    #[test]
    fn requires_consecutive_onset_frames() {
        let mut ep = Endpointer::new(EndpointerConfig {
            onset_frames: 3,
            ..Default::default()
        });
        let t0 = Instant::now();
        assert_eq!(ep.feed(&loud_frame(), 0.01, t0), Decision::Continue);
        assert!(!ep.onset_accepted);
        assert_eq!(ep.feed(&loud_frame(), 0.01, t0), Decision::Continue);
        assert_eq!(ep.feed(&loud_frame(), 0.01, t0), Decision::Continue);
        assert!(ep.onset_accepted);
    }

    #[test]
    fn transient_onset_below_min_duration_is_discarded() {
        let mut ep = Endpointer::new(EndpointerConfig {
            onset_frames: 1,
            min_speech_duration: Duration::from_secs(1),
            trailing_silence: Duration::from_millis(10),
            ..Default::default()
        });
        let t0 = Instant::now();
        ep.feed(&loud_frame(), 0.01, t0);
        assert!(ep.onset_accepted);
        // Silence arrives before min_speech_duration elapses.
        let t1 = t0 + Duration::from_millis(50);
        let d = ep.feed(&silent_frame(), 0.01, t1);
        assert_eq!(d, Decision::Continue);
        assert!(!ep.onset_accepted, "transient onset must be discarded");
    }

    #[test]
    fn hard_max_fires_end_with_audio_without_trailing_silence() {
        let mut ep = Endpointer::new(EndpointerConfig {
            onset_frames: 1,
            min_speech_duration: Duration::from_millis(1),
            hard_max: Duration::from_millis(100),
            ..Default::default()
        });
        let t0 = Instant::now();
        ep.feed(&loud_frame(), 0.01, t0);
        let t1 = t0 + Duration::from_millis(150);
        assert_eq!(ep.feed(&loud_frame(), 0.01, t1), Decision::EndWithAudio);
    }

    #[test]
    fn hard_max_fires_end_with_audio_with_zero_speech_frames() {
        let mut ep = Endpointer::new(EndpointerConfig {
            onset_frames: 3,
            hard_max: Duration::from_millis(100),
            ..Default::default()
        });
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(150);
        assert!(!ep.onset_accepted);
        assert_eq!(ep.feed(&silent_frame(), 0.5, t1), Decision::EndWithAudio);
    }

    #[test]
    fn idle_without_onset_emits_end_empty_in_continued_conversation() {
        let mut ep = Endpointer::new(EndpointerConfig {
            idle_timeout: Duration::from_millis(50),
            ..Default::default()
        });
        ep.reset(true, 2);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(ep.feed(&silent_frame(), 0.5, t1), Decision::EndEmpty);
    }

    #[test]
    fn idle_without_onset_keeps_listening_on_first_turn() {
        let mut ep = Endpointer::new(EndpointerConfig {
            idle_timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(ep.feed(&silent_frame(), 0.5, t1), Decision::Continue);
    }
}
