//! Dialog Controller (spec §4.11, C11): the state machine that owns the
//! per-turn buffer and every transition. Cooperative single-threaded tick
//! loop — one call to `tick()` is either a small batch of Idle frames, one
//! Listening/Speaking frame, or one Processing pipeline run (spec §5).

pub mod bargein;
pub mod retry;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::alarm::{Alarm, AlarmStore, RingingFlag};
use crate::audio::capture::AudioSource;
use crate::audio::noise::NoiseEstimator;
use crate::audio::sink::{synth_ring_tone, AudioSink};
use crate::config::{Config, QuietHoursConfig, RetryConfig};
use crate::endpoint::{Decision, Endpointer, EndpointerConfig};
use crate::intent::time_parse::NoExternalParser;
use crate::intent::{self, AlarmOp, IntentResult, RouterContext, SwitchOp};
use crate::llm::LlmClient;
use crate::music::{self, MusicAction, MusicIntent};
use crate::quality::{self, AudioQualityConfig, QualityVerdict, RejectKind};
use crate::skills::SkillDispatcher;
use crate::stt::SttAdapter;
use crate::switch::SwitchBridge;
use crate::tts::Tts;
use crate::wake_word::WakeWordGate;

use bargein::{BargeInConfig, BargeInTick, BargeInWatcher};
use retry::{RetryOutcome, RetryPolicy};
use state::{DialogState, TurnContext, UtteranceBuffer};

const IDLE_FRAMES_PER_TICK: usize = 3;
const MAX_TURNS_PER_CONVERSATION: u32 = 20;
const FAREWELL_TEXT: &str = "好的，下次再聊。";
const OFFLINE_TEXT: &str = "网络好像不太好，我们稍后再聊吧。";
const WAKE_ACK_TEXT: &str = "我在";
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What to do once the current Speaking playback finishes.
enum AfterSpeech {
    Idle,
    Listen { continuation: bool },
}

/// The reply (if any) a routed intent produced, plus whether handling it
/// should end the conversation rather than continue listening.
enum DispatchOutcome {
    Reply { text: String, end_conversation: bool },
    Silent,
}

pub struct DialogController {
    state: DialogState,

    sample_rate: u32,
    frame_len: usize,
    frame_duration: Duration,

    source: AudioSource,
    sink: AudioSink,
    noise: NoiseEstimator,
    wake_gate: WakeWordGate,
    endpointer: Endpointer,
    bargein: BargeInWatcher,
    retry: RetryPolicy,

    buffer: UtteranceBuffer,
    turn: Option<TurnContext>,
    music_control_mode: bool,
    music_playing: bool,
    after_speech: AfterSpeech,

    stt: SttAdapter,
    tts: Tts,
    llm: LlmClient,
    skills: SkillDispatcher,

    alarm_store: Arc<AlarmStore>,
    ringing: RingingFlag,
    switch: Option<SwitchBridge>,

    switch_keywords: Vec<(String, String, bool)>,
    skill_keywords: Vec<(String, String)>,
    stop_words: Vec<String>,

    quiet_hours_enabled: bool,
    quiet_hours_start: NaiveTime,
    quiet_hours_end: NaiveTime,

    post_turn_delay: Duration,
    post_playback_settle: Duration,

    min_duration_secs: f64,
    min_energy: f32,
    min_chinese_chars: usize,
    invalid_words: Vec<String>,
    max_listening_secs: f64,
}

impl DialogController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: &Config,
        source: AudioSource,
        sink: AudioSink,
        wake_gate: WakeWordGate,
        stt: SttAdapter,
        tts: Tts,
        llm: LlmClient,
        skills: SkillDispatcher,
        alarm_store: Arc<AlarmStore>,
        ringing: RingingFlag,
        switch: Option<SwitchBridge>,
    ) -> Self {
        let noise = NoiseEstimator::new(
            cfg.noise.window_size,
            cfg.noise.base_threshold,
            cfg.noise.adaptation_factor,
            cfg.noise.reset_interval_secs,
        );
        let endpointer = Endpointer::new(EndpointerConfig {
            min_speech_duration: Duration::from_secs_f64(cfg.endpointer.min_speech_duration_secs),
            onset_frames: cfg.endpointer.onset_frames,
            trailing_silence: Duration::from_secs_f64(cfg.endpointer.trailing_silence_secs),
            hard_max: Duration::from_secs_f64(cfg.endpointer.hard_max_secs),
            idle_timeout: Duration::from_secs_f64(cfg.endpointer.idle_timeout_secs),
        });
        let retry = build_retry_policy(&cfg.retry);
        let bargein = BargeInWatcher::new(BargeInConfig::default());

        let switch_keywords = cfg
            .intent
            .switch_keywords
            .iter()
            .map(|e| (e.verb.clone(), e.device.clone(), e.turn_on))
            .collect();
        let skill_keywords = cfg
            .intent
            .skill_keywords
            .iter()
            .map(|e| (e.keyword.clone(), e.skill.clone()))
            .collect();
        let (quiet_hours_start, quiet_hours_end) = parse_quiet_hours(&cfg.quiet_hours);

        Self {
            state: DialogState::Idle,
            sample_rate: cfg.audio.sample_rate,
            frame_len: cfg.audio.frame_len,
            frame_duration: Duration::from_secs_f64(
                cfg.audio.frame_len as f64 / cfg.audio.sample_rate as f64,
            ),
            source,
            sink,
            noise,
            wake_gate,
            endpointer,
            bargein,
            retry,
            buffer: UtteranceBuffer::new(cfg.endpointer.hard_max_secs, cfg.audio.sample_rate, cfg.audio.frame_len),
            turn: None,
            music_control_mode: false,
            music_playing: false,
            after_speech: AfterSpeech::Idle,
            stt,
            tts,
            llm,
            skills,
            alarm_store,
            ringing,
            switch,
            switch_keywords,
            skill_keywords,
            stop_words: cfg.intent.stop_words.clone(),
            quiet_hours_enabled: cfg.quiet_hours.enabled,
            quiet_hours_start,
            quiet_hours_end,
            post_turn_delay: Duration::from_secs_f64(cfg.wake_word.post_turn_delay_secs),
            post_playback_settle: Duration::from_millis(1500),
            min_duration_secs: cfg.quality_gate.min_duration_secs,
            min_energy: cfg.quality_gate.min_energy,
            min_chinese_chars: cfg.quality_gate.min_chinese_chars,
            invalid_words: cfg.quality_gate.invalid_words.clone(),
            max_listening_secs: cfg.endpointer.hard_max_secs,
        }
    }

    /// Drives the controller until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        info!("dialog controller starting in Idle");
        loop {
            if shutdown.try_recv().is_ok() {
                info!("dialog controller shutting down");
                return;
            }
            self.tick().await;
        }
    }

    async fn tick(&mut self) {
        match self.state {
            DialogState::Idle => self.idle_tick().await,
            DialogState::Wakeup => self.wakeup_tick().await,
            DialogState::Listening => self.listening_tick().await,
            DialogState::Processing => self.processing_tick().await,
            DialogState::Speaking => self.speaking_tick().await,
            DialogState::Error => self.error_tick().await,
        }
    }

    async fn next_frame(&mut self) -> Vec<i16> {
        loop {
            if let Some(frame) = self.source.try_next_frame() {
                return frame;
            }
            tokio::time::sleep(FRAME_POLL_INTERVAL).await;
        }
    }

    fn transition(&mut self, target: DialogState) {
        match self.state.validate_transition(target) {
            Ok(next) => {
                debug!(from = ?self.state, to = ?next, "dialog state transition");
                self.state = next;
            }
            Err(e) => {
                error!("{e}");
                self.state = DialogState::Error;
            }
        }
    }

    fn in_quiet_hours(&self) -> bool {
        quiet_hours_active(
            self.quiet_hours_enabled,
            self.quiet_hours_start,
            self.quiet_hours_end,
            chrono::Local::now().time(),
        )
    }

    // ------------------------------------------------------------------
    // Idle
    // ------------------------------------------------------------------

    async fn idle_tick(&mut self) {
        for _ in 0..IDLE_FRAMES_PER_TICK {
            let frame = self.next_frame().await;
            self.noise.update(&frame);
            self.wake_gate.tick(Instant::now());

            if self.in_quiet_hours() && !self.ringing.is_ringing() {
                continue;
            }

            if self.wake_gate.feed(&frame) {
                self.on_wake().await;
                return;
            }
        }
    }

    async fn on_wake(&mut self) {
        self.source.drain_pending();
        self.turn = Some(TurnContext::new());
        self.retry.reset();

        if self.music_playing {
            self.music_control_mode = true;
            let tone = synth_ring_tone(self.sample_rate, 1);
            self.sink.play(&tone, self.sample_rate);
            self.enter_listening(false).await;
        } else {
            self.music_control_mode = false;
            self.transition(DialogState::Wakeup);
        }
    }

    async fn wakeup_tick(&mut self) {
        self.speak(WAKE_ACK_TEXT).await;
        self.enter_listening(false).await;
    }

    // ------------------------------------------------------------------
    // Listening
    // ------------------------------------------------------------------

    async fn enter_listening(&mut self, continuation: bool) {
        self.source.drain_pending();
        if continuation {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        self.buffer = UtteranceBuffer::new(self.max_listening_secs, self.sample_rate, self.frame_len);
        let in_conversation = self.turn.as_ref().is_some_and(|t| t.in_conversation);
        let turn_count = self.turn.as_ref().map(|t| t.turn_index).unwrap_or(1);
        self.endpointer.reset(in_conversation, turn_count);
        self.bargein.reset();
        self.transition(DialogState::Listening);
    }

    async fn listening_tick(&mut self) {
        let frame = self.next_frame().await;
        let threshold = self.noise.threshold();
        let now = Instant::now();

        match self.endpointer.feed(&frame, threshold, now) {
            Decision::Continue => {
                self.buffer.push(frame);
            }
            Decision::EndWithAudio => {
                self.buffer.push(frame);
                self.transition(DialogState::Processing);
            }
            Decision::EndEmpty => {
                self.speak(FAREWELL_TEXT).await;
                self.enter_speaking(AfterSpeech::Idle);
            }
        }
    }

    // ------------------------------------------------------------------
    // Processing (spec §4.11.1)
    // ------------------------------------------------------------------

    async fn processing_tick(&mut self) {
        let pcm = self.buffer.concat();

        let audio_cfg = AudioQualityConfig {
            min_duration_secs: self.min_duration_secs,
            min_energy: self.min_energy,
            sample_rate: self.sample_rate,
        };
        if let QualityVerdict::Reject(kind) = quality::check_audio(&pcm, &audio_cfg) {
            self.handle_reject(kind).await;
            return;
        }

        let raw_text = match self.stt.transcribe(&pcm, self.sample_rate).await {
            Ok(t) => t,
            Err(e) => {
                warn!("stt transcription failed: {e}");
                self.speak(OFFLINE_TEXT).await;
                self.enter_speaking(AfterSpeech::Idle);
                return;
            }
        };
        let stripped = quality::strip_tags(&raw_text);

        let turn_index = self.turn.as_ref().map(|t| t.turn_index).unwrap_or(1);
        let last_assistant = self.turn.as_ref().and_then(|t| t.last_assistant_text.as_deref());
        if turn_index >= 2 && is_echo(&stripped, last_assistant) {
            self.enter_listening(true).await;
            return;
        }

        if let QualityVerdict::Reject(kind) = quality::check_text(&stripped, self.min_chinese_chars, &self.invalid_words) {
            self.handle_reject(kind).await;
            return;
        }
        self.retry.reset();

        let intent_result = {
            let ctx = RouterContext {
                alarm_ringing: self.ringing.is_ringing(),
                music_control_mode: self.music_control_mode,
                switch_keywords: &self.switch_keywords,
                skill_keywords: &self.skill_keywords,
                stop_words: &self.stop_words,
            };
            intent::route(&stripped, &ctx, &NoExternalParser, None)
        };

        if self.music_control_mode && !matches!(intent_result, IntentResult::Music(_)) {
            // Restricted grammar: anything that isn't a music-control verb
            // exits the mode without ever reaching the chat LLM (spec §4.12).
            self.music_control_mode = false;
            self.enter_idle().await;
            return;
        }

        match self.dispatch_intent(intent_result, &stripped, turn_index).await {
            Ok(DispatchOutcome::Reply { text, end_conversation }) => {
                if let Some(turn) = &mut self.turn {
                    turn.advance_turn(stripped.clone(), text.clone());
                }
                self.speak(&text).await;
                let after = if end_conversation || turn_index + 1 >= MAX_TURNS_PER_CONVERSATION {
                    AfterSpeech::Idle
                } else {
                    AfterSpeech::Listen { continuation: true }
                };
                self.enter_speaking(after);
            }
            Ok(DispatchOutcome::Silent) => {
                self.enter_idle().await;
            }
            Err(()) => {
                self.speak(OFFLINE_TEXT).await;
                self.enter_speaking(AfterSpeech::Idle);
            }
        }
    }

    async fn handle_reject(&mut self, kind: RejectKind) {
        match self.retry.on_reject(kind) {
            RetryOutcome::Reprompt(prompt) => {
                self.speak(&prompt).await;
                self.enter_speaking(AfterSpeech::Listen { continuation: true });
            }
            RetryOutcome::Exhausted(prompt) => {
                if prompt.is_empty() {
                    self.enter_idle().await;
                } else {
                    self.speak(&prompt).await;
                    self.enter_speaking(AfterSpeech::Idle);
                }
            }
        }
    }

    async fn dispatch_intent(
        &mut self,
        intent: IntentResult,
        raw_text: &str,
        turn_index: u32,
    ) -> Result<DispatchOutcome, ()> {
        match intent {
            IntentResult::Alarm(AlarmOp::StopRinging) => {
                self.ringing.set(false);
                Ok(DispatchOutcome::Reply { text: "好的，闹钟已停止。".to_string(), end_conversation: true })
            }
            IntentResult::Alarm(op) => {
                Ok(DispatchOutcome::Reply { text: self.handle_alarm_op(op), end_conversation: false })
            }
            IntentResult::Switch(op) => {
                Ok(DispatchOutcome::Reply { text: self.handle_switch_op(op).await, end_conversation: false })
            }
            IntentResult::Music(intent) => {
                let exits_mode =
                    self.music_control_mode && matches!(intent.action, MusicAction::Stop | MusicAction::Pause);
                let text = self.handle_music_intent(intent);
                if exits_mode {
                    self.music_control_mode = false;
                }
                Ok(DispatchOutcome::Reply { text, end_conversation: exits_mode })
            }
            IntentResult::Skill(name) => {
                let mut kwargs = HashMap::new();
                kwargs.insert("text".to_string(), raw_text.to_string());
                let text = self
                    .skills
                    .execute(&name, &kwargs)
                    .unwrap_or_else(|| "抱歉，我暂时处理不了这个请求。".to_string());
                Ok(DispatchOutcome::Reply { text, end_conversation: false })
            }
            IntentResult::Chat(text) => match self.llm.chat(&text, turn_index).await {
                Ok(reply) => Ok(DispatchOutcome::Reply { text: reply, end_conversation: false }),
                Err(e) => {
                    warn!("chat llm call failed: {e}");
                    Err(())
                }
            },
        }
    }

    fn handle_alarm_op(&mut self, op: AlarmOp) -> String {
        match op {
            AlarmOp::Set { time, message } => match self.alarm_store.add_alarm(time.naive_local(), &message, "ring") {
                Ok(_) => format!("好的，已设置 {} 的闹钟。", time.format("%H:%M")),
                Err(e) => {
                    error!("add_alarm failed: {e}");
                    "抱歉，设置闹钟失败了。".to_string()
                }
            },
            AlarmOp::List => match self.alarm_store.get_active_alarms() {
                Ok(alarms) if alarms.is_empty() => "目前没有设置闹钟。".to_string(),
                Ok(alarms) => {
                    let times: Vec<String> = alarms.iter().map(|a| a.time.format("%H:%M").to_string()).collect();
                    format!("你有 {} 个闹钟：{}", alarms.len(), times.join("，"))
                }
                Err(e) => {
                    error!("list alarms failed: {e}");
                    "抱歉，查询闹钟失败了。".to_string()
                }
            },
            AlarmOp::Delete(_) => match self.alarm_store.get_active_alarms() {
                Ok(alarms) if !alarms.is_empty() => {
                    let target = alarms[0].id;
                    match self.alarm_store.delete_alarm(target) {
                        Ok(true) => "好的，已删除闹钟。".to_string(),
                        _ => "抱歉，删除闹钟失败了。".to_string(),
                    }
                }
                _ => "目前没有可删除的闹钟。".to_string(),
            },
            AlarmOp::Snooze(minutes) => {
                self.ringing.set(false);
                let time = chrono::Local::now() + chrono::Duration::minutes(minutes);
                match self.alarm_store.add_alarm(time.naive_local(), "稍后提醒", "ring") {
                    Ok(_) => format!("好的，{} 分钟后再提醒你。", minutes),
                    Err(_) => "抱歉，设置稍后提醒失败了。".to_string(),
                }
            }
            AlarmOp::StopRinging => {
                self.ringing.set(false);
                "好的，闹钟已停止。".to_string()
            }
        }
    }

    async fn handle_switch_op(&mut self, op: SwitchOp) -> String {
        let Some(bridge) = &self.switch else {
            return "智能开关功能未启用。".to_string();
        };
        let (device, on) = match op {
            SwitchOp::TurnOn { device } => (device, true),
            SwitchOp::TurnOff { device } => (device, false),
        };
        match bridge.set_key(&device, 1, on).await {
            Ok(true) => format!("好的，已{}{}。", if on { "打开" } else { "关闭" }, device),
            Ok(false) => format!("{}似乎没有响应。", device),
            Err(e) => {
                warn!("switch op on {device} failed: {e}");
                format!("抱歉，操作{}失败了。", device)
            }
        }
    }

    fn handle_music_intent(&mut self, intent: MusicIntent) -> String {
        match intent.action {
            MusicAction::Play => self.music_playing = true,
            MusicAction::Stop => self.music_playing = false,
            _ => {}
        }
        music::format_response(&intent.action, intent.keyword.as_deref())
    }

    // ------------------------------------------------------------------
    // Speaking
    // ------------------------------------------------------------------

    async fn speak(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.tts.synthesize(text, None).await {
            Ok((pcm, sr)) => self.sink.play(&pcm, sr),
            Err(e) => warn!("tts synthesis failed: {e}"),
        }
    }

    fn enter_speaking(&mut self, after: AfterSpeech) {
        self.after_speech = after;
        self.bargein.reset();
        self.transition(DialogState::Speaking);
    }

    async fn speaking_tick(&mut self) {
        let frame = self.next_frame().await;

        if let BargeInTick::Confirmed(buffer) = self.bargein.tick(
            &frame,
            &self.noise,
            self.frame_duration,
            self.sample_rate,
            self.frame_len,
        ) {
            self.sink.stop();
            self.buffer = buffer;
            if let Some(turn) = &mut self.turn {
                turn.turn_index += 1;
            }
            let in_conversation = self.turn.as_ref().is_some_and(|t| t.in_conversation);
            let turn_count = self.turn.as_ref().map(|t| t.turn_index).unwrap_or(1);
            self.endpointer.reset(in_conversation, turn_count);
            self.transition(DialogState::Listening);
            return;
        }

        if self.sink.is_playing() {
            return;
        }

        tokio::time::sleep(self.post_playback_settle).await;
        match std::mem::replace(&mut self.after_speech, AfterSpeech::Idle) {
            AfterSpeech::Idle => self.enter_idle().await,
            AfterSpeech::Listen { continuation } => {
                let in_conversation = self.turn.as_ref().is_some_and(|t| t.in_conversation);
                if in_conversation {
                    self.enter_listening(continuation).await;
                } else {
                    self.enter_idle().await;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Idle entry / Error
    // ------------------------------------------------------------------

    async fn enter_idle(&mut self) {
        self.turn = None;
        self.music_control_mode = false;
        self.transition(DialogState::Idle);
        self.wake_gate.disable(Instant::now() + self.post_turn_delay);
    }

    async fn error_tick(&mut self) {
        error!("dialog controller in Error state; recovering to Idle");
        self.enter_idle().await;
    }
}

/// Speaks the ring tone or a pre-generated "cheer text" for each fired alarm
/// on a detached worker, looping until `ringing` is cleared by the Dialog
/// Controller's stop-ringing intent (spec §4.9, §5).
pub async fn run_ringing_worker(
    mut rx: mpsc::Receiver<Alarm>,
    sink: Arc<AudioSink>,
    tts: Arc<Tts>,
    ringing: RingingFlag,
) {
    while let Some(alarm) = rx.recv().await {
        info!(id = alarm.id, theme = %alarm.theme, "alarm ringing worker: alarm fired");

        if alarm.use_cheerword() {
            let text = alarm.cheerword.clone().unwrap_or_else(|| alarm.message.clone());
            if !text.is_empty() {
                match tts.synthesize(&text, None).await {
                    Ok((pcm, sr)) => sink.play(&pcm, sr),
                    Err(e) => warn!("ringing cheer synthesis failed: {e}"),
                }
            }
        }

        while ringing.is_ringing() {
            let tone = synth_ring_tone(16_000, 2);
            sink.play(&tone, 16_000);
            while sink.is_playing() && ringing.is_ringing() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if !ringing.is_ringing() {
                sink.stop();
            }
        }
    }
}

fn quiet_hours_active(enabled: bool, start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if !enabled {
        return false;
    }
    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

fn parse_quiet_hours(cfg: &QuietHoursConfig) -> (NaiveTime, NaiveTime) {
    let parse = |s: &str, fallback: (u32, u32)| {
        NaiveTime::parse_from_str(s, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(fallback.0, fallback.1, 0).unwrap())
    };
    (parse(&cfg.start, (23, 0)), parse(&cfg.end, (6, 0)))
}

/// An utterance echoes the assistant's own last reply (spec §4.11.1 step 3):
/// either contains it, or is contained by it, once both sides are non-empty.
fn is_echo(candidate: &str, last_assistant: Option<&str>) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return false;
    }
    match last_assistant {
        Some(prev) if !prev.trim().is_empty() => prev.contains(candidate) || candidate.contains(prev),
        _ => false,
    }
}

fn reject_kind_from_str(s: &str) -> Option<RejectKind> {
    match s {
        "silence" => Some(RejectKind::Silence),
        "fragment" => Some(RejectKind::Fragment),
        "semantic" => Some(RejectKind::Semantic),
        "garbage" => Some(RejectKind::Garbage),
        _ => None,
    }
}

fn build_retry_policy(cfg: &RetryConfig) -> RetryPolicy {
    let mut policy = RetryPolicy::new(cfg.max_retries);
    for (kind_str, prompts) in &cfg.prompts {
        if let Some(kind) = reject_kind_from_str(kind_str) {
            for (i, prompt) in prompts.iter().enumerate() {
                policy = policy.with_prompt(kind, (i + 1) as u32, prompt.clone());
            }
        }
    }
    for (kind_str, prompt) in &cfg.final_prompts {
        if let Some(kind) = reject_kind_from_str(kind_str) {
            policy = policy.with_final(kind, prompt.clone());
        }
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_hours_spanning_midnight() {
        let start = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert!(quiet_hours_active(true, start, end, NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(quiet_hours_active(true, start, end, NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(!quiet_hours_active(true, start, end, NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn quiet_hours_disabled_is_never_active() {
        let start = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert!(!quiet_hours_active(false, start, end, NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
    }

    #[test]
    fn echo_of_last_reply_is_detected() {
        assert!(is_echo("今天天气不错", Some("今天天气不错，适合出门")));
        assert!(!is_echo("讲个笑话", Some("今天天气不错")));
        assert!(!is_echo("讲个笑话", None));
    }

    #[test]
    fn retry_policy_reads_config_table() {
        let mut cfg = RetryConfig { max_retries: 2, ..Default::default() };
        cfg.prompts.insert("silence".to_string(), vec!["再说一遍？".to_string()]);
        cfg.final_prompts.insert("silence".to_string(), "先休息一下。".to_string());
        let mut policy = build_retry_policy(&cfg);
        match policy.on_reject(RejectKind::Silence) {
            RetryOutcome::Reprompt(p) => assert_eq!(p, "再说一遍？"),
            RetryOutcome::Exhausted(_) => panic!("expected reprompt"),
        }
    }
}
