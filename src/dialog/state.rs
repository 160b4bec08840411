//! Dialog state machine data model (spec §3, §4.11).
//!
//! `DialogState` transitions all pass through `DialogState::validate_transition`,
//! the single choke point invariant 1 requires. Nothing outside this module
//! should construct a transition without going through it.

use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogState {
    Idle,
    Wakeup,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl DialogState {
    /// Allowed-transitions table (spec §4.11).
    fn allowed_targets(self) -> &'static [DialogState] {
        use DialogState::*;
        match self {
            Idle => &[Wakeup, Error],
            Wakeup => &[Listening, Error],
            Listening => &[Processing, Idle, Wakeup, Error],
            Processing => &[Speaking, Idle, Listening, Wakeup, Error],
            Speaking => &[Idle, Listening, Wakeup, Error],
            Error => &[Idle],
        }
    }

    pub fn can_transition_to(self, target: DialogState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Validates the transition against the table, returning the error
    /// variant the rest of the crate uses to report an illegal move.
    pub fn validate_transition(
        self,
        target: DialogState,
    ) -> Result<DialogState, crate::error::VoiceError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(crate::error::VoiceError::StateMachine { from: self, to: target })
        }
    }
}

/// Per-turn conversational context (spec §3), created on wake and cleared
/// when leaving conversation (entering Idle).
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub turn_index: u32,
    pub last_user_text: Option<String>,
    pub last_assistant_text: Option<String>,
    pub in_conversation: bool,
    pub awaiting_user_since: Instant,
}

impl TurnContext {
    pub fn new() -> Self {
        Self {
            turn_index: 1,
            last_user_text: None,
            last_assistant_text: None,
            in_conversation: true,
            awaiting_user_since: Instant::now(),
        }
    }

    pub fn advance_turn(&mut self, user_text: String, assistant_text: String) {
        self.turn_index += 1;
        self.last_user_text = Some(user_text);
        self.last_assistant_text = Some(assistant_text);
        self.awaiting_user_since = Instant::now();
    }
}

impl Default for TurnContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded ordered sequence of Frames for one turn (spec §3). Capacity is
/// computed as `ceil(max_listening_duration * sample_rate / frame_len)`;
/// insertion past capacity drops the oldest frame.
pub struct UtteranceBuffer {
    frames: VecDeque<Vec<i16>>,
    capacity: usize,
}

impl UtteranceBuffer {
    pub fn new(max_listening_duration_secs: f64, sample_rate: u32, frame_len: usize) -> Self {
        let capacity = ((max_listening_duration_secs * sample_rate as f64) / frame_len as f64)
            .ceil() as usize;
        Self {
            frames: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, frame: Vec<i16>) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len_frames(&self) -> usize {
        self.frames.len()
    }

    /// Concatenate into one PCM blob (spec §4.11.1 step 1).
    pub fn concat(&self) -> Vec<i16> {
        let total: usize = self.frames.iter().map(|f| f.len()).sum();
        let mut out = Vec::with_capacity(total);
        for f in &self.frames {
            out.extend_from_slice(f);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_cannot_go_directly_to_processing() {
        assert!(!DialogState::Idle.can_transition_to(DialogState::Processing));
        assert!(DialogState::Idle.validate_transition(DialogState::Processing).is_err());
    }

    #[test]
    fn idle_to_wakeup_is_allowed() {
        assert!(DialogState::Idle.validate_transition(DialogState::Wakeup).is_ok());
    }

    #[test]
    fn error_only_recovers_to_idle() {
        assert!(DialogState::Error.can_transition_to(DialogState::Idle));
        assert!(!DialogState::Error.can_transition_to(DialogState::Speaking));
    }

    #[test]
    fn buffer_drops_oldest_frame_past_capacity() {
        let mut buf = UtteranceBuffer::new(0.1, 16_000, 1600); // capacity = 1
        buf.push(vec![1i16; 1600]);
        buf.push(vec![2i16; 1600]);
        assert_eq!(buf.len_frames(), 1);
        assert_eq!(buf.concat(), vec![2i16; 1600]);
    }
}
