//! TTS cache (spec §6): an opaque per-phrase WAV file keyed by MD5 of the
//! phrase, plus a sidecar JSON metadata index. Atomic-write pattern
//! (temp file + rename) grounded on the inbox manager's `write_inbox`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::wav::{decode_wav, encode_wav};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheIndex {
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    sample_rate: u32,
    created_at: String,
}

pub struct TtsCache {
    dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<CacheIndex>,
}

fn key_for(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    hex::encode(digest)
}

impl TtsCache {
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let index_path = dir.join("index.json");
        let index = std::fs::read_to_string(&index_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self { dir: dir.to_path_buf(), index_path, index: Mutex::new(index) }
    }

    fn wav_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.wav"))
    }

    /// Returns cached PCM for `text` if present, verifying the file's hash
    /// still matches the key (spec §8 round-trip law).
    pub fn get(&self, text: &str) -> Option<(Vec<i16>, u32)> {
        let key = key_for(text);
        if !self.index.lock().unwrap().entries.contains_key(&key) {
            return None;
        }
        let path = self.wav_path(&key);
        match decode_wav_file(&path) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("tts cache: stale/corrupt entry for key {key}: {e}");
                None
            }
        }
    }

    /// Stores PCM for `text`, keyed by MD5(text). `synthesize(text)` called
    /// twice must return byte-identical PCM from the second call (spec §8).
    pub fn put(&self, text: &str, pcm: &[i16], sample_rate: u32) -> Result<(), crate::error::VoiceError> {
        let key = key_for(text);
        let bytes = encode_wav(pcm, sample_rate)?;
        let path = self.wav_path(&key);
        let tmp = self.dir.join(format!(".{key}.{}.tmp", std::process::id()));
        std::fs::write(&tmp, &bytes)
            .map_err(|e| crate::error::VoiceError::Tts(format!("cache write: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| crate::error::VoiceError::Tts(format!("cache rename: {e}")))?;

        let mut index = self.index.lock().unwrap();
        index.entries.insert(
            key,
            CacheEntry { sample_rate, created_at: chrono::Local::now().to_rfc3339() },
        );
        self.write_index(&index)?;
        debug!("tts cache: stored {} bytes for phrase of len {}", bytes.len(), text.len());
        Ok(())
    }

    fn write_index(&self, index: &CacheIndex) -> Result<(), crate::error::VoiceError> {
        let json = serde_json::to_string_pretty(index)
            .map_err(|e| crate::error::VoiceError::Tts(format!("index serialize: {e}")))?;
        let tmp = self.dir.join(format!(".index.{}.tmp", std::process::id()));
        std::fs::write(&tmp, &json)
            .map_err(|e| crate::error::VoiceError::Tts(format!("index write: {e}")))?;
        std::fs::rename(&tmp, &self.index_path)
            .map_err(|e| crate::error::VoiceError::Tts(format!("index rename: {e}")))?;
        Ok(())
    }
}

fn decode_wav_file(path: &Path) -> Result<(Vec<i16>, u32), crate::error::VoiceError> {
    let bytes = std::fs::read(path)
        .map_err(|e| crate::error::VoiceError::Tts(format!("cache read: {e}")))?;
    decode_wav(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::open(dir.path());
        let pcm = vec![1i16, 2, 3, -4, 5];
        cache.put("你好", &pcm, 16_000).unwrap();
        let (got, sr) = cache.get("你好").unwrap();
        assert_eq!(got, pcm);
        assert_eq!(sr, 16_000);
    }

    #[test]
    fn miss_for_unknown_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::open(dir.path());
        assert!(cache.get("从未见过").is_none());
    }

    #[test]
    fn key_is_md5_of_phrase() {
        assert_eq!(key_for("hi"), "49f68a5c8493ec2c0bf489821c21fc3b");
    }
}
