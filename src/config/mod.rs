//! Configuration loading: a single `config.toml`, deserialized into nested
//! tables mirroring the component list (spec §2). Every field has a default
//! so a missing or partial config file still produces a working daemon.

pub mod paths;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VoiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub noise: NoiseConfig,
    pub wake_word: WakeWordConfig,
    pub endpointer: EndpointerConfig,
    pub quality_gate: QualityGateConfig,
    pub retry: RetryConfig,
    pub intent: IntentConfig,
    pub alarm: AlarmConfig,
    pub quiet_hours: QuietHoursConfig,
    pub switch: SwitchConfig,
    pub tts: TtsConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub skills: SkillsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            noise: NoiseConfig::default(),
            wake_word: WakeWordConfig::default(),
            endpointer: EndpointerConfig::default(),
            quality_gate: QualityGateConfig::default(),
            retry: RetryConfig::default(),
            intent: IntentConfig::default(),
            alarm: AlarmConfig::default(),
            quiet_hours: QuietHoursConfig::default(),
            switch: SwitchConfig::default(),
            tts: TtsConfig::default(),
            stt: SttConfig::default(),
            llm: LlmConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_len: usize,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_len: 512,
            input_device: None,
            output_device: None,
            gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub window_size: usize,
    pub base_threshold: f32,
    pub adaptation_factor: f32,
    pub reset_interval_secs: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            base_threshold: 0.01,
            adaptation_factor: 1.5,
            reset_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    pub threshold: f32,
    pub post_turn_delay_secs: f64,
    pub purge_frames: usize,
    pub model_dir: Option<String>,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            threshold: 0.98,
            post_turn_delay_secs: 1.5,
            purge_frames: 16,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointerConfig {
    pub min_speech_duration_secs: f64,
    pub onset_frames: u32,
    pub trailing_silence_secs: f64,
    pub hard_max_secs: f64,
    pub idle_timeout_secs: f64,
}

impl Default for EndpointerConfig {
    fn default() -> Self {
        Self {
            min_speech_duration_secs: 0.3,
            onset_frames: 3,
            trailing_silence_secs: 2.0,
            hard_max_secs: 10.0,
            idle_timeout_secs: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    pub min_duration_secs: f64,
    pub min_energy: f32,
    pub min_chinese_chars: usize,
    pub invalid_words: Vec<String>,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.5,
            min_energy: 0.01,
            min_chinese_chars: 1,
            invalid_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// prompts[kind][attempt] -> text; attempt 0 is the first retry prompt.
    pub prompts: HashMap<String, Vec<String>>,
    pub final_prompts: HashMap<String, String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            prompts: HashMap::new(),
            final_prompts: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchKeywordEntry {
    pub verb: String,
    pub device: String,
    pub turn_on: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillKeywordEntry {
    pub keyword: String,
    pub skill: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub skill_keywords: Vec<SkillKeywordEntry>,
    pub switch_keywords: Vec<SwitchKeywordEntry>,
    pub stop_words: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            skill_keywords: Vec::new(),
            switch_keywords: vec![
                SwitchKeywordEntry { verb: "打开".into(), device: "灯".into(), turn_on: true },
                SwitchKeywordEntry { verb: "关闭".into(), device: "灯".into(), turn_on: false },
            ],
            stop_words: vec!["停止".into(), "停".into(), "stop".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub db_path: Option<String>,
    pub tick_period_secs: u64,
    pub default_theme: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            tick_period_secs: 1,
            default_theme: "ring".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "23:00".to_string(),
            end: "06:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub enabled: bool,
    pub broker: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keepalive_secs: u64,
    pub qos: u8,
    pub prefix: String,
    pub user_id: String,
    pub status_timeout_secs: u64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "voxd".to_string(),
            keepalive_secs: 60,
            qos: 1,
            prefix: "geekopen".to_string(),
            user_id: "default".to_string(),
            status_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub adapter: String,
    pub voice: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub short_reply_chars: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            adapter: "kokoro".to_string(),
            voice: None,
            api_key: None,
            endpoint: None,
            short_reply_chars: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub adapter: String,
    pub model_size: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            adapter: "whisper-local".to_string(),
            model_size: Some("base".to_string()),
            api_key: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    pub enabled: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Load `config.toml` from the data directory. Missing file -> defaults.
/// A present-but-invalid file is a fatal `VoiceError::Config` (spec §7).
pub fn load_config() -> Result<Config, VoiceError> {
    let path = paths::get_config_path();
    load_config_from(&path)
}

fn load_config_from(path: &Path) -> Result<Config, VoiceError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)
            .map_err(|e| VoiceError::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no config.toml found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(VoiceError::Config(format!("{}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("does-not-exist.toml")).unwrap();
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.endpointer.hard_max_secs, 10.0);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 0\n").unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.retry.max_retries, 0);
        assert_eq!(cfg.audio.sample_rate, 16_000);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [[[").unwrap();
        assert!(matches!(load_config_from(&path), Err(VoiceError::Config(_))));
    }
}
