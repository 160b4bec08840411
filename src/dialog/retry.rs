//! Retry/Backoff Policy (spec §4.11.2, C12).
//!
//! Per-turn counter; on each quality-gate rejection, either picks the next
//! retry prompt and re-enters Listening, or (counter exhausted) plays the
//! final prompt and returns to Idle.

use std::collections::HashMap;

use crate::quality::RejectKind;

pub enum RetryOutcome {
    /// Re-enter Listening with this prompt spoken first.
    Reprompt(String),
    /// max_retries exhausted: speak this final prompt and return to Idle.
    Exhausted(String),
}

const GENERIC_REPROMPT: &str = "我没听清楚，请再说一遍。";
const GENERIC_FINAL: &str = "好像有点安静，我先休息一下。";

pub struct RetryPolicy {
    max_retries: u32,
    counter: u32,
    /// (kind, attempt_index) -> prompt. attempt_index is 1-based.
    prompts: HashMap<(RejectKind, u32), String>,
    finals: HashMap<RejectKind, String>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            counter: 0,
            prompts: HashMap::new(),
            finals: HashMap::new(),
        }
    }

    pub fn with_prompt(mut self, kind: RejectKind, attempt: u32, prompt: impl Into<String>) -> Self {
        self.prompts.insert((kind, attempt), prompt.into());
        self
    }

    pub fn with_final(mut self, kind: RejectKind, prompt: impl Into<String>) -> Self {
        self.finals.insert(kind, prompt.into());
        self
    }

    /// Resets the per-turn counter (spec: successful turn, return to Idle,
    /// fresh conversation via wake).
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// max_retries == 0 disables retries entirely: the caller should
    /// silently return to Idle without speaking anything.
    pub fn disabled(&self) -> bool {
        self.max_retries == 0
    }

    pub fn on_reject(&mut self, kind: RejectKind) -> RetryOutcome {
        if self.disabled() {
            self.counter = 0;
            return RetryOutcome::Exhausted(String::new());
        }

        self.counter += 1;
        if self.counter > self.max_retries {
            let prompt = self
                .finals
                .get(&kind)
                .cloned()
                .unwrap_or_else(|| GENERIC_FINAL.to_string());
            self.counter = 0;
            RetryOutcome::Exhausted(prompt)
        } else {
            let prompt = self
                .prompts
                .get(&(kind, self.counter))
                .cloned()
                .unwrap_or_else(|| GENERIC_REPROMPT.to_string());
            RetryOutcome::Reprompt(prompt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_max_retries_then_resets() {
        let mut policy = RetryPolicy::new(1);
        match policy.on_reject(RejectKind::Silence) {
            RetryOutcome::Reprompt(_) => {}
            RetryOutcome::Exhausted(_) => panic!("should reprompt on first reject"),
        }
        match policy.on_reject(RejectKind::Silence) {
            RetryOutcome::Exhausted(_) => {}
            RetryOutcome::Reprompt(_) => panic!("should exhaust on second reject"),
        }
        // Counter reset after exhaustion; next reject reprompts again.
        match policy.on_reject(RejectKind::Silence) {
            RetryOutcome::Reprompt(_) => {}
            RetryOutcome::Exhausted(_) => panic!("counter should have reset"),
        }
    }

    #[test]
    fn zero_max_retries_always_exhausts_silently() {
        let mut policy = RetryPolicy::new(0);
        match policy.on_reject(RejectKind::Garbage) {
            RetryOutcome::Exhausted(p) => assert!(p.is_empty()),
            RetryOutcome::Reprompt(_) => panic!("disabled retries must not reprompt"),
        }
    }

    #[test]
    fn falls_back_to_generic_prompt_when_unconfigured() {
        let mut policy = RetryPolicy::new(2);
        match policy.on_reject(RejectKind::Fragment) {
            RetryOutcome::Reprompt(p) => assert_eq!(p, GENERIC_REPROMPT),
            RetryOutcome::Exhausted(_) => panic!("unexpected exhaustion"),
        }
    }
}
