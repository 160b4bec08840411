//! Text-to-Speech adapters and the hybrid synthesis router (spec §6, §9
//! Open Question #2).
//!
//! Provides a common `TtsEngine` trait with implementations for:
//! - Local Kokoro ONNX synthesis (behind `native-ml` feature)
//! - Edge TTS (free Microsoft cloud voices)
//! - OpenAI TTS API
//! - ElevenLabs TTS API
//!
//! `Tts::synthesize` is the single entry point every caller uses: it checks
//! the cache first regardless of route, then resolves an engine (an
//! explicit per-call scenario override, or the configured default), and
//! falls back to the local engine if a cloud engine errors.

pub mod cache;
pub mod cloud;
pub mod kokoro;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use cache::TtsCache;

/// Common trait for all TTS engines (dyn-compatible).
pub trait TtsEngine: Send + Sync {
    /// Synthesize text to f32 PCM audio samples at this engine's native rate.
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<f32>>> + Send + '_>>;

    /// Interrupt any in-progress synthesis.
    fn stop(&self);

    /// Display name for this engine (e.g. "Kokoro (af_bella)").
    fn name(&self) -> String;

    /// Native output sample rate.
    fn sample_rate(&self) -> u32;
}

/// Which TTS backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    KokoroLocal,
    EdgeCloud,
    OpenAiCloud,
    ElevenLabsCloud,
}

/// Create a TTS engine from config values.
///
/// `adapter` is one of: "kokoro", "edge", "openai-tts", "elevenlabs".
pub fn create_tts_engine(
    adapter: &str,
    data_dir: &Path,
    voice: Option<&str>,
    api_key: Option<&str>,
    _endpoint: Option<&str>,
) -> anyhow::Result<Box<dyn TtsEngine>> {
    match adapter {
        "kokoro" => {
            let model_dir = data_dir.join("models").join("kokoro");
            let mut engine = kokoro::KokoroTts::new(&model_dir)?;
            if let Some(v) = voice {
                engine.set_voice(v);
            }
            Ok(Box::new(engine))
        }
        "edge" => {
            let v = voice.unwrap_or("en-US-AriaNeural");
            Ok(Box::new(cloud::EdgeTts::new(v)))
        }
        "openai-tts" => {
            let key = api_key.ok_or_else(|| anyhow::anyhow!("OpenAI TTS requires an API key"))?;
            let v = voice.unwrap_or("alloy");
            Ok(Box::new(cloud::OpenAiTts::new(key, v)))
        }
        "elevenlabs" => {
            let key = api_key.ok_or_else(|| anyhow::anyhow!("ElevenLabs TTS requires an API key"))?;
            let v = voice.unwrap_or("Rachel");
            Ok(Box::new(cloud::ElevenLabsTts::new(key, v)))
        }
        other => anyhow::bail!("Unknown TTS adapter: {}", other),
    }
}

fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Hybrid TTS router (spec §9 Open Question #2): cache-first, then scenario
/// override or default engine, with local-engine fallback on cloud error.
pub struct Tts {
    default_engine: Box<dyn TtsEngine>,
    local_fallback: Option<Box<dyn TtsEngine>>,
    cache: TtsCache,
}

impl Tts {
    pub fn new(default_engine: Box<dyn TtsEngine>, local_fallback: Option<Box<dyn TtsEngine>>, cache_dir: &Path) -> Self {
        Self { default_engine, local_fallback, cache: TtsCache::open(cache_dir) }
    }

    /// Synthesizes `text`, returning signed-16-bit PCM plus its sample rate.
    /// `scenario_override` lets a caller (e.g. the Alarm Scheduler's cheer
    /// text) force a specific engine for this call only.
    pub async fn synthesize(
        &self,
        text: &str,
        scenario_override: Option<&dyn TtsEngine>,
    ) -> anyhow::Result<(Vec<i16>, u32)> {
        if let Some((pcm, sr)) = self.cache.get(text) {
            return Ok((pcm, sr));
        }

        let engine: &dyn TtsEngine = scenario_override.unwrap_or(self.default_engine.as_ref());
        let result = engine.speak(text).await;

        let (samples, sr) = match result {
            Ok(samples) => (samples, engine.sample_rate()),
            Err(e) => {
                warn!("tts engine '{}' failed: {e}; falling back to local engine", engine.name());
                match &self.local_fallback {
                    Some(local) => (local.speak(text).await?, local.sample_rate()),
                    None => return Err(e),
                }
            }
        };

        let pcm = to_i16(&samples);
        if let Err(e) = self.cache.put(text, &pcm, sr) {
            warn!("tts cache write failed: {e}");
        }
        Ok((pcm, sr))
    }

    pub fn stop(&self) {
        self.default_engine.stop();
        if let Some(l) = &self.local_fallback {
            l.stop();
        }
    }
}

struct FailingEngine;
impl TtsEngine for FailingEngine {
    fn speak(&self, _text: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<f32>>> + Send + '_>> {
        Box::pin(async { Err(anyhow::anyhow!("engine unavailable")) })
    }
    fn stop(&self) {}
    fn name(&self) -> String {
        "failing".to_string()
    }
    fn sample_rate(&self) -> u32 {
        16_000
    }
}

struct EchoEngine(Arc<std::sync::atomic::AtomicU32>);
impl TtsEngine for EchoEngine {
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<f32>>> + Send + '_>> {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let len = text.len();
        Box::pin(async move { Ok(vec![0.5f32; len.max(1)]) })
    }
    fn stop(&self) {}
    fn name(&self) -> String {
        "echo".to_string()
    }
    fn sample_rate(&self) -> u32 {
        16_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_never_invokes_engine() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let engine = Box::new(EchoEngine(calls.clone()));
        let tts = Tts::new(engine, None, dir.path());

        tts.synthesize("你好", None).await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        tts.synthesize("你好", None).await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1, "second call must hit cache");
    }

    #[tokio::test]
    async fn falls_back_to_local_when_default_fails() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let tts = Tts::new(Box::new(FailingEngine), Some(Box::new(EchoEngine(calls.clone()))), dir.path());
        let (pcm, _sr) = tts.synthesize("fallback text", None).await.unwrap();
        assert!(!pcm.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_fallback_propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        let tts = Tts::new(Box::new(FailingEngine), None, dir.path());
        assert!(tts.synthesize("x", None).await.is_err());
    }
}
