//! Quality Gate (spec §4.6, C6).
//!
//! Two sub-gates: audio (duration/energy) and text (transcript shape). Each
//! rejection yields a `QualityVerdict::Reject(kind)` for the Retry Policy.

use regex::Regex;
use std::sync::OnceLock;

use crate::audio::noise::rms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    Silence,
    Fragment,
    Semantic,
    Garbage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityVerdict {
    Ok,
    Reject(RejectKind),
}

pub struct AudioQualityConfig {
    pub min_duration_secs: f64,
    pub min_energy: f32,
    pub sample_rate: u32,
}

/// Audio gate (spec §4.6): rejects too-short or too-quiet utterances.
pub fn check_audio(pcm: &[i16], cfg: &AudioQualityConfig) -> QualityVerdict {
    let duration_secs = pcm.len() as f64 / cfg.sample_rate as f64;
    if duration_secs < cfg.min_duration_secs {
        return QualityVerdict::Reject(RejectKind::Silence);
    }
    if rms(pcm) < cfg.min_energy {
        return QualityVerdict::Reject(RejectKind::Silence);
    }
    QualityVerdict::Ok
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\|[^|]*\|>").unwrap())
}

fn punctuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[[:punct:]\s]").unwrap())
}

/// Strip recognizer meta-tags of the form `<|...|>` (spec §4.6 text gate).
pub fn strip_tags(text: &str) -> String {
    tag_regex().replace_all(text, "").trim().to_string()
}

fn count_chinese_chars(s: &str) -> usize {
    s.chars()
        .filter(|c| ('\u{4E00}'..='\u{9FFF}').contains(c))
        .count()
}

fn count_hangul_chars(s: &str) -> usize {
    s.chars()
        .filter(|c| ('\u{AC00}'..='\u{D7A3}').contains(c))
        .count()
}

fn english_word_count(s: &str) -> usize {
    s.split_whitespace()
        .filter(|w| w.chars().all(|c| c.is_ascii_alphabetic()))
        .count()
}

/// Text gate (spec §4.6). `invalid_words` is the configured invalid-word
/// list matched against the punctuation-stripped text.
pub fn check_text(raw: &str, min_chinese: usize, invalid_words: &[String]) -> QualityVerdict {
    let stripped = strip_tags(raw);
    if stripped.is_empty() {
        return QualityVerdict::Reject(RejectKind::Garbage);
    }

    let chinese_chars = count_chinese_chars(&stripped);
    let hangul_chars = count_hangul_chars(&stripped);
    let english_words = english_word_count(&stripped);

    if hangul_chars > chinese_chars {
        return QualityVerdict::Reject(RejectKind::Garbage);
    }

    if chinese_chars < min_chinese && !(english_words >= 2 && stripped.len() >= 5) {
        return QualityVerdict::Reject(RejectKind::Garbage);
    }

    let depunct: String = punctuation_regex().replace_all(&stripped, "").to_string();
    if depunct.chars().count() >= 2 {
        let mut chars = depunct.chars();
        let first = chars.next().unwrap();
        if chars.clone().all(|c| c == first) {
            return QualityVerdict::Reject(RejectKind::Fragment);
        }
    }

    if invalid_words.iter().any(|w| w == &depunct) {
        return QualityVerdict::Reject(RejectKind::Semantic);
    }

    QualityVerdict::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chinese_char_is_ok() {
        assert_eq!(check_text("好", 1, &[]), QualityVerdict::Ok);
    }

    #[test]
    fn empty_after_strip_is_garbage() {
        assert_eq!(
            check_text("<|endoftext|>", 1, &[]),
            QualityVerdict::Reject(RejectKind::Garbage)
        );
    }

    #[test]
    fn repeated_char_is_fragment() {
        assert_eq!(check_text("啊啊啊", 1, &[]), QualityVerdict::Reject(RejectKind::Fragment));
    }

    #[test]
    fn invalid_word_is_semantic() {
        let list = vec!["谢谢收看".to_string()];
        assert_eq!(
            check_text("谢谢收看", 1, &list),
            QualityVerdict::Reject(RejectKind::Semantic)
        );
    }

    #[test]
    fn single_english_word_below_chinese_minimum_is_garbage() {
        assert_eq!(check_text("a", 1, &[]), QualityVerdict::Reject(RejectKind::Garbage));
    }

    #[test]
    fn hangul_heavy_text_is_garbage() {
        assert_eq!(
            check_text("안녕하세요", 1, &[]),
            QualityVerdict::Reject(RejectKind::Garbage)
        );
    }

    #[test]
    fn short_silent_audio_is_rejected() {
        let cfg = AudioQualityConfig {
            min_duration_secs: 0.5,
            min_energy: 0.01,
            sample_rate: 16_000,
        };
        let pcm = vec![0i16; 1000];
        assert_eq!(check_audio(&pcm, &cfg), QualityVerdict::Reject(RejectKind::Silence));
    }
}
