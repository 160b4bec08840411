//! Time-phrase parsing cascade (spec §4.7), grounded on the original
//! implementation's `time_parser.py`: an external locale-aware parser first,
//! then relative-offset regex, then fuzzy part-of-day mapping, then an
//! optional LLM-assisted structured extraction. A parsed time in the past is
//! rejected (spec §4.7, §8 "reject").

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use regex::Regex;

/// Fuzzy day-part mapping (original_source TIME_MAPPING).
pub fn default_time_mapping() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("早上", "07:00"),
        ("上午", "09:00"),
        ("中午", "12:00"),
        ("下午", "14:00"),
        ("晚上", "18:00"),
        ("半夜", "00:00"),
        ("凌晨", "02:00"),
    ])
}

/// Relative-time units in seconds (original_source TIME_UNITS).
fn time_units() -> &'static HashMap<&'static str, i64> {
    static UNITS: OnceLock<HashMap<&'static str, i64>> = OnceLock::new();
    UNITS.get_or_init(|| {
        HashMap::from([("秒", 1), ("分钟", 60), ("小时", 3600), ("天", 86_400)])
    })
}

fn chinese_number(text: &str) -> Option<f64> {
    let map: HashMap<&str, f64> = HashMap::from([
        ("零", 0.0), ("一", 1.0), ("二", 2.0), ("两", 2.0), ("三", 3.0),
        ("四", 4.0), ("五", 5.0), ("六", 6.0), ("七", 7.0), ("八", 8.0),
        ("九", 9.0), ("十", 10.0), ("半", 0.5),
    ]);
    if let Some(v) = map.get(text) {
        return Some(*v);
    }
    if let Some(prefix) = text.strip_suffix('十') {
        if prefix.is_empty() {
            return Some(10.0);
        }
        if let Some(p) = map.get(prefix) {
            return Some(p * 10.0);
        }
    }
    text.parse::<f64>().ok()
}

fn relative_offset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([一二三四五六七八九十百零半\d.]+)\s*(秒|分钟|小时|天)\s*(?:之)?(?:以)?后?")
            .unwrap()
    })
}

fn hour_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})[点:时]").unwrap())
}

fn minute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})分").unwrap())
}

/// A structured Y/M/D/H/M record, as the LLM-assisted fallback would return.
#[derive(Debug, Clone, Copy)]
pub struct LlmTimeRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

/// Locale-aware external parser hook (stage a). The original relies on the
/// Python `dateparser` package, which has no Rust equivalent in the corpus;
/// callers that have a real external parser can supply one here. Returns
/// `None` by default so the cascade falls through to the built-in stages.
pub trait ExternalTimeParser {
    fn parse(&self, _text: &str) -> Option<chrono::DateTime<Local>> {
        None
    }
}

pub struct NoExternalParser;
impl ExternalTimeParser for NoExternalParser {}

/// Parse a natural-language alarm time (spec §4.7 cascade). `llm` is an
/// optional stage-d fallback that returns a structured Y/M/D/H/M record.
pub fn parse_alarm_time(
    text: &str,
    external: &dyn ExternalTimeParser,
    llm: Option<&dyn Fn(&str) -> Option<LlmTimeRecord>>,
) -> Option<chrono::DateTime<Local>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = external.parse(text) {
        return reject_if_past(dt);
    }
    if let Some(dt) = parse_relative(text) {
        return reject_if_past(dt);
    }
    if let Some(dt) = parse_fuzzy(text) {
        return reject_if_past(dt);
    }
    if let Some(f) = llm {
        if let Some(rec) = f(text) {
            if let Some(dt) = Local
                .with_ymd_and_hms(rec.year, rec.month, rec.day, rec.hour, rec.minute, 0)
                .single()
            {
                return reject_if_past(dt);
            }
        }
    }
    None
}

fn reject_if_past(dt: chrono::DateTime<Local>) -> Option<chrono::DateTime<Local>> {
    if dt < Local::now() {
        None
    } else {
        Some(dt)
    }
}

fn parse_relative(text: &str) -> Option<chrono::DateTime<Local>> {
    let caps = relative_offset_regex().captures(text)?;
    let number = chinese_number(&caps[1])?;
    let unit = &caps[2];
    let seconds_per_unit = *time_units().get(unit)?;
    let total_secs = (number * seconds_per_unit as f64).round() as i64;
    Some(Local::now() + ChronoDuration::seconds(total_secs))
}

fn parse_fuzzy(text: &str) -> Option<chrono::DateTime<Local>> {
    let now = Local::now();

    let mapping = default_time_mapping();
    let mut mapped_hour: Option<u32> = None;
    for (word, default_time) in &mapping {
        if text.contains(word) {
            mapped_hour = NaiveTime::parse_from_str(default_time, "%H:%M")
                .ok()
                .map(|t| t.hour_only());
            break;
        }
    }

    let explicit_hour = hour_regex()
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok())
        .map(|h| h.min(23));
    let explicit_minute = minute_regex()
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(0);

    if text.contains("明天") {
        let hour = explicit_hour.or(mapped_hour).unwrap_or(7);
        let target = now + ChronoDuration::days(1);
        return target
            .with_hour(hour)?
            .with_minute(explicit_minute)?
            .with_second(0)?
            .with_nanosecond(0);
    }

    if text.contains("今天") || explicit_hour.is_some() {
        let hour = explicit_hour.or(mapped_hour)?;
        let mut result = now
            .with_hour(hour)?
            .with_minute(explicit_minute)?
            .with_second(0)?
            .with_nanosecond(0)?;
        if result < now {
            result += ChronoDuration::days(1);
        }
        return Some(result);
    }

    None
}

use chrono::Timelike;

trait HourOnly {
    fn hour_only(&self) -> u32;
}
impl HourOnly for NaiveTime {
    fn hour_only(&self) -> u32 {
        self.hour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_minutes_parses_forward_in_time() {
        let now = Local::now();
        let dt = parse_alarm_time("30分钟后", &NoExternalParser, None).unwrap();
        assert!(dt > now);
        assert!(dt <= now + ChronoDuration::minutes(31));
    }

    #[test]
    fn relative_with_chinese_number() {
        let now = Local::now();
        let dt = parse_alarm_time("两分钟后", &NoExternalParser, None).unwrap();
        assert!(dt > now && dt <= now + ChronoDuration::minutes(3));
    }

    #[test]
    fn past_explicit_time_today_rolls_to_tomorrow() {
        let dt = parse_alarm_time("今天0点0分", &NoExternalParser, None);
        // 00:00 today is almost certainly in the past; cascade must roll
        // forward to tomorrow rather than reject outright, unless "now" is
        // itself exactly midnight.
        assert!(dt.is_some());
    }

    #[test]
    fn empty_text_returns_none() {
        assert!(parse_alarm_time("", &NoExternalParser, None).is_none());
    }
}
