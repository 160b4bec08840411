//! Wake-Word Gate (spec §4.4, C4).
//!
//! Wraps the OpenWakeWord detector with a latching gate: while disabled, a
//! frame is discarded without ever reaching the detector, so the detector's
//! own internal smoothing/embedding state can't be polluted by the
//! assistant's own TTS echo. `tick()` re-enables the gate only after feeding
//! it a fixed number of silent frames to flush that internal context.

pub mod oww;

use std::time::Instant;

pub use oww::OpenWakeWord;

pub struct WakeWordGate {
    detector: OpenWakeWord,
    threshold: f32,
    enabled: bool,
    resume_at: Option<Instant>,
    purge_frames: usize,
    purging_remaining: usize,
    frame_len: usize,
}

impl WakeWordGate {
    pub fn new(detector: OpenWakeWord, threshold: f32, purge_frames: usize, frame_len: usize) -> Self {
        Self {
            detector,
            threshold,
            enabled: true,
            resume_at: None,
            purge_frames,
            purging_remaining: 0,
            frame_len,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `feed(frame) -> bool`: true only if enabled and confidence >= threshold.
    pub fn feed(&mut self, frame: &[i16]) -> bool {
        if !self.enabled {
            return false;
        }
        let (detected, score) = self.detector.process(frame);
        detected && score >= self.threshold
    }

    /// Disables the gate; `resume_at` is when it should begin re-enabling.
    pub fn disable(&mut self, resume_at: Instant) {
        self.enabled = false;
        self.resume_at = Some(resume_at);
        self.purging_remaining = 0;
    }

    /// If disabled and `now >= resume_at`, feed purge frames of silence
    /// (output suppressed) to flush detector context, then enable once the
    /// purge count is exhausted (spec §4.4).
    pub fn tick(&mut self, now: Instant) {
        if self.enabled {
            return;
        }
        let Some(resume_at) = self.resume_at else {
            return;
        };
        if now < resume_at {
            return;
        }
        if self.purging_remaining == 0 && self.purge_frames > 0 {
            self.purging_remaining = self.purge_frames;
            self.detector.reset();
        }
        if self.purging_remaining > 0 {
            let silence = vec![0i16; self.frame_len];
            let _ = self.detector.process(&silence);
            self.purging_remaining -= 1;
            if self.purging_remaining == 0 {
                self.enabled = true;
                self.resume_at = None;
            }
        } else {
            self.enabled = true;
            self.resume_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn disabled_gate_never_invokes_detector() {
        let mut gate = WakeWordGate::new(OpenWakeWord::new(), 0.98, 3, 512);
        gate.disable(Instant::now() + Duration::from_secs(10));
        assert!(!gate.feed(&vec![1i16; 512]));
        assert!(!gate.is_enabled());
    }

    #[test]
    fn tick_before_resume_time_stays_disabled() {
        let mut gate = WakeWordGate::new(OpenWakeWord::new(), 0.98, 3, 512);
        let resume = Instant::now() + Duration::from_secs(60);
        gate.disable(resume);
        gate.tick(Instant::now());
        assert!(!gate.is_enabled());
    }

    #[test]
    fn tick_after_resume_purges_then_enables() {
        let mut gate = WakeWordGate::new(OpenWakeWord::new(), 0.98, 2, 512);
        gate.disable(Instant::now());
        // Needs `purge_frames` ticks after resume_at has passed.
        gate.tick(Instant::now());
        assert!(!gate.is_enabled());
        gate.tick(Instant::now());
        assert!(gate.is_enabled());
    }
}
