//! Intent Router (spec §4.7, C7).
//!
//! Context-sensitive priority list, evaluated in order, first match wins:
//! ringing stop-intent, switch intent, music intent (restricted grammar in
//! music-control mode), alarm intent (including bare time phrases), skill
//! keyword match, then free-form chat fallback.

pub mod time_parse;

use chrono::{DateTime, Local};

use crate::music::{self, MusicIntent};
use time_parse::{parse_alarm_time, ExternalTimeParser, LlmTimeRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum AlarmOp {
    Set { time: DateTime<Local>, message: String },
    List,
    Delete(u64),
    Snooze(i64),
    StopRinging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOp {
    TurnOn { device: String },
    TurnOff { device: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentResult {
    Alarm(AlarmOp),
    Switch(SwitchOp),
    Music(MusicIntent),
    Skill(String),
    Chat(String),
}

/// Ambient facts the router needs to disambiguate (spec §4.7, §4.11).
pub struct RouterContext<'a> {
    pub alarm_ringing: bool,
    pub music_control_mode: bool,
    pub switch_keywords: &'a [(String, String, bool)], // (verb, device, turn_on)
    pub skill_keywords: &'a [(String, String)], // (keyword, skill name)
    pub stop_words: &'a [String],
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(w.as_str()))
}

fn match_switch(text: &str, keywords: &[(String, String, bool)]) -> Option<SwitchOp> {
    for (verb, device, turn_on) in keywords {
        if text.contains(verb.as_str()) && text.contains(device.as_str()) {
            return Some(if *turn_on {
                SwitchOp::TurnOn { device: device.clone() }
            } else {
                SwitchOp::TurnOff { device: device.clone() }
            });
        }
    }
    None
}

fn match_skill(text: &str, keywords: &[(String, String)]) -> Option<String> {
    keywords
        .iter()
        .find(|(kw, _)| text.contains(kw.as_str()))
        .map(|(_, name)| name.clone())
}

/// A bare time phrase is "short and mostly time-like" (spec §4.7 rule 4):
/// few characters beyond digits/colon/time-unit words.
fn looks_like_bare_time(text: &str) -> bool {
    if text.chars().count() > 12 {
        return false;
    }
    let non_time_chars = text
        .chars()
        .filter(|c| {
            !c.is_ascii_digit()
                && *c != ':'
                && !matches!(
                    c,
                    '点' | '分' | '时' | '早' | '上' | '午' | '中' | '下' | '晚' | '半' | '夜' | '凌' | '晨' | '明' | '今' | '天' | '后'
                )
        })
        .count();
    non_time_chars <= 2
}

fn match_alarm(
    text: &str,
    external: &dyn ExternalTimeParser,
    llm: Option<&dyn Fn(&str) -> Option<LlmTimeRecord>>,
) -> Option<AlarmOp> {
    if text.contains("列出") || text.contains("查看闹钟") || text.contains("所有闹钟") {
        return Some(AlarmOp::List);
    }
    if text.contains("删除闹钟") || text.contains("取消闹钟") {
        return Some(AlarmOp::Delete(0));
    }
    if text.contains("再睡") || text.contains("稍后提醒") || text.contains("snooze") {
        return Some(AlarmOp::Snooze(10));
    }
    if text.contains("设置") || text.contains("提醒") || text.contains("叫我") || text.contains("闹钟") {
        if let Some(time) = parse_alarm_time(text, external, llm) {
            return Some(AlarmOp::Set { time, message: text.to_string() });
        }
    }
    if looks_like_bare_time(text) {
        if let Some(time) = parse_alarm_time(text, external, llm) {
            return Some(AlarmOp::Set { time, message: String::new() });
        }
    }
    None
}

/// Route one transcript through the priority cascade (spec §4.7).
pub fn route(
    text: &str,
    ctx: &RouterContext,
    external: &dyn ExternalTimeParser,
    llm: Option<&dyn Fn(&str) -> Option<LlmTimeRecord>>,
) -> IntentResult {
    if ctx.alarm_ringing && contains_any(text, ctx.stop_words) {
        return IntentResult::Alarm(AlarmOp::StopRinging);
    }

    if let Some(op) = match_switch(text, ctx.switch_keywords) {
        return IntentResult::Switch(op);
    }

    if ctx.music_control_mode {
        if let Some(intent) = music::detect_control(text) {
            return IntentResult::Music(intent);
        }
    } else if let Some(intent) = music::detect_full(text) {
        return IntentResult::Music(intent);
    }

    if let Some(op) = match_alarm(text, external, llm) {
        return IntentResult::Alarm(op);
    }

    if let Some(name) = match_skill(text, ctx.skill_keywords) {
        return IntentResult::Skill(name);
    }

    IntentResult::Chat(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::MusicAction;
    use time_parse::NoExternalParser;

    #[test]
    fn ringing_stop_word_wins_over_everything() {
        let switch_kw = vec![("打开".to_string(), "灯".to_string(), true)];
        let stop_words = vec!["停".to_string()];
        let ctx = RouterContext {
            alarm_ringing: true,
            music_control_mode: false,
            switch_keywords: &switch_kw,
            skill_keywords: &[],
            stop_words: &stop_words,
        };
        let r = route("停", &ctx, &NoExternalParser, None);
        assert_eq!(r, IntentResult::Alarm(AlarmOp::StopRinging));
    }

    #[test]
    fn switch_intent_matches_verb_and_device() {
        let switch_kw = vec![("打开".to_string(), "灯".to_string(), true)];
        let ctx = RouterContext {
            alarm_ringing: false,
            music_control_mode: false,
            switch_keywords: &switch_kw,
            skill_keywords: &[],
            stop_words: &[],
        };
        let r = route("帮我打开灯", &ctx, &NoExternalParser, None);
        assert_eq!(r, IntentResult::Switch(SwitchOp::TurnOn { device: "灯".to_string() }));
    }

    #[test]
    fn music_control_mode_restricts_to_playback_grammar() {
        let ctx = RouterContext {
            alarm_ringing: false,
            music_control_mode: true,
            switch_keywords: &[],
            skill_keywords: &[],
            stop_words: &[],
        };
        let r = route("暂停", &ctx, &NoExternalParser, None);
        assert_eq!(
            r,
            IntentResult::Music(crate::music::MusicIntent { action: MusicAction::Pause, keyword: None })
        );
        // Anything that doesn't match the restricted grammar falls through
        // to chat rather than being reinterpreted as a skill/alarm.
        let r2 = route("今天天气怎么样", &ctx, &NoExternalParser, None);
        assert_eq!(r2, IntentResult::Chat("今天天气怎么样".to_string()));
    }

    #[test]
    fn bare_time_phrase_is_alarm_set() {
        let ctx = RouterContext {
            alarm_ringing: false,
            music_control_mode: false,
            switch_keywords: &[],
            skill_keywords: &[],
            stop_words: &[],
        };
        let r = route("明天7点", &ctx, &NoExternalParser, None);
        assert!(matches!(r, IntentResult::Alarm(AlarmOp::Set { .. })));
    }

    #[test]
    fn unmatched_text_falls_back_to_chat() {
        let ctx = RouterContext {
            alarm_ringing: false,
            music_control_mode: false,
            switch_keywords: &[],
            skill_keywords: &[],
            stop_words: &[],
        };
        let r = route("给我讲个笑话", &ctx, &NoExternalParser, None);
        assert_eq!(r, IntentResult::Chat("给我讲个笑话".to_string()));
    }
}
