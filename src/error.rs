//! Error taxonomy (spec §7): kinds, not concrete per-engine error types.
//!
//! Library code (`stt`, `tts`, `llm`, `switch`) returns `anyhow::Result` for
//! ergonomic `?` propagation; the Dialog Controller classifies failures into
//! a `VoiceError` kind at the point where it decides user-visible behavior
//! (speak fallback sentence vs. drop vs. exit non-zero).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("audio device error: {0}")]
    Audio(String),

    #[error("audio quality rejected: {0:?}")]
    AudioQuality(crate::quality::RejectKind),

    #[error("model not ready: {0}")]
    ModelNotReady(String),

    #[error("model failed to load: {0}")]
    ModelLoad(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("wake word detector error: {0}")]
    WakeWord(String),

    #[error("speech-to-text failed: {0}")]
    Stt(String),

    #[error("text-to-speech failed: {0}")]
    Tts(String),

    #[error("llm chat failed: {0}")]
    Llm(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("disallowed state transition: {from:?} -> {to:?}")]
    StateMachine {
        from: crate::dialog::state::DialogState,
        to: crate::dialog::state::DialogState,
    },

    #[error("alarm scheduler error: {0}")]
    Alarm(String),

    #[error("music control error: {0}")]
    Music(String),
}

impl VoiceError {
    /// True for failures that must surface to the process entry point and
    /// exit non-zero (spec §7: "Fatal errors").
    pub fn is_fatal(&self) -> bool {
        matches!(self, VoiceError::Config(_))
    }
}

/// Classify an arbitrary `anyhow::Error` coming out of an STT/TTS/LLM call
/// into the taxonomy kind the Retry/propagation policy needs. Network-ish
/// failures (timeouts, connection errors) are distinguished from generic
/// service failures so §7's "specific polite-offline utterance" rule applies.
pub fn classify_network(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("network")
        || msg.contains("dns")
        || msg.contains("unreachable")
}
