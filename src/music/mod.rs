//! Music-control mode (spec §4.12) and the music intent grammar it shares
//! with the Intent Router's full-grammar mode (spec §4.7 rule 3), grounded
//! on the original implementation's `music_intent_detector.py`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicAction {
    Play,
    Pause,
    Resume,
    Stop,
    Next,
    VolumeUp,
    VolumeDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicIntent {
    pub action: MusicAction,
    pub keyword: Option<String>,
}

const PLAY_KEYWORDS: &[&str] = &[
    "播放", "来点", "放首歌", "听歌", "音乐", "小曲", "烘托氛围", "背景音乐", "配乐",
];
const PAUSE_KEYWORDS: &[&str] = &["暂停", "停一下", "等等"];
const RESUME_KEYWORDS: &[&str] = &["继续", "恢复", "接着播"];
const STOP_KEYWORDS: &[&str] = &["停止", "关掉", "别播了", "不听了", "关闭", "停下"];
const VOLUME_UP_KEYWORDS: &[&str] = &[
    "大声点", "声音大点", "音量大点", "响一点", "放大音量", "增加音量", "调大音量", "调大声", "大声",
];
const VOLUME_DOWN_KEYWORDS: &[&str] = &[
    "小声点", "声音小点", "音量小点", "轻一点", "减小音量", "降低音量", "调小音量", "调小声", "小声",
];
const NEXT_KEYWORDS: &[&str] = &["下一首", "换一个", "换歌", "切歌", "换一首", "换个"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn extract_keyword(text: &str) -> Option<String> {
    let mut result = text.to_string();
    for kw in PLAY_KEYWORDS {
        result = result.replace(kw, "");
    }
    let result: String = result
        .chars()
        .filter(|c| !matches!(c, '，' | '。' | '！' | '？' | '、') && !c.is_whitespace())
        .collect();
    if result.is_empty() || matches!(result.as_str(), "音乐" | "歌" | "曲") {
        None
    } else {
        Some(result)
    }
}

/// Full grammar (spec §4.7 rule 3, outside music-control mode): also
/// recognizes "play" with an optional search keyword.
pub fn detect_full(text: &str) -> Option<MusicIntent> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if contains_any(text, VOLUME_UP_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::VolumeUp, keyword: None });
    }
    if contains_any(text, VOLUME_DOWN_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::VolumeDown, keyword: None });
    }
    if contains_any(text, PAUSE_KEYWORDS) && !contains_any(text, STOP_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Pause, keyword: None });
    }
    if contains_any(text, RESUME_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Resume, keyword: None });
    }
    if contains_any(text, STOP_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Stop, keyword: None });
    }
    if contains_any(text, PLAY_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Play, keyword: extract_keyword(text) });
    }
    None
}

/// Restricted grammar used in music-control mode (spec §4.7 rule 3, §4.12):
/// only pause/stop/volume/next, so lyrics leaking into the transcript never
/// trigger chat. Priority: stop > volume > next > pause.
pub fn detect_control(text: &str) -> Option<MusicIntent> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if contains_any(text, STOP_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Stop, keyword: None });
    }
    if contains_any(text, VOLUME_UP_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::VolumeUp, keyword: None });
    }
    if contains_any(text, VOLUME_DOWN_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::VolumeDown, keyword: None });
    }
    if contains_any(text, NEXT_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Next, keyword: None });
    }
    if contains_any(text, PAUSE_KEYWORDS) {
        return Some(MusicIntent { action: MusicAction::Pause, keyword: None });
    }
    None
}

pub fn format_response(action: &MusicAction, track_name: Option<&str>) -> String {
    match action {
        MusicAction::Play => match track_name {
            Some(name) => format!("好的，为您播放《{name}》"),
            None => "好的，随机播放一首音乐".to_string(),
        },
        MusicAction::Pause => "好的，暂停播放".to_string(),
        MusicAction::Resume => "好的，继续播放".to_string(),
        MusicAction::Stop => "好的，停止播放音乐".to_string(),
        MusicAction::VolumeUp => "好的，音量已调大".to_string(),
        MusicAction::VolumeDown => "好的，音量已调小".to_string(),
        MusicAction::Next => "好的，换一首".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_grammar_extracts_search_keyword() {
        let intent = detect_full("播放周杰伦的歌").unwrap();
        assert_eq!(intent.action, MusicAction::Play);
        assert_eq!(intent.keyword.as_deref(), Some("周杰伦的"));
    }

    #[test]
    fn pause_not_confused_with_stop() {
        let intent = detect_full("暂停一下").unwrap();
        assert_eq!(intent.action, MusicAction::Pause);
    }

    #[test]
    fn control_mode_ignores_lyrics() {
        assert!(detect_control("爱是一道光").is_none());
    }

    #[test]
    fn control_mode_recognizes_stop_even_embedded() {
        let intent = detect_control("我想要停止啦").unwrap();
        assert_eq!(intent.action, MusicAction::Stop);
    }

    #[test]
    fn control_mode_stop_outranks_volume() {
        // Both a stop and a volume keyword present: stop wins.
        let intent = detect_control("大声点，然后停止").unwrap();
        assert_eq!(intent.action, MusicAction::Stop);
    }
}
