//! voxd — always-on, on-device voice assistant runtime.
//!
//! Entry point: loads configuration, stands up every subsystem with
//! graceful degradation per spec §7 (a missing microphone, model file, or
//! network credential disables its feature rather than aborting the
//! process), then drives the Dialog Controller's tick loop until an OS
//! interrupt asks it to shut down.

mod alarm;
mod audio;
mod config;
mod dialog;
mod endpoint;
mod error;
mod intent;
mod llm;
mod music;
mod quality;
mod skills;
mod stt;
mod switch;
mod tts;
mod wake_word;
mod wav;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alarm::{AlarmStore, RingingFlag, Scheduler};
use audio::capture::{start_capture, AudioSource};
use audio::ring_buffer::audio_ring_buffer;
use audio::sink::AudioSink;
use config::paths::{get_alarm_db_path, get_logs_dir, get_tts_cache_dir};
use dialog::DialogController;
use llm::LlmClient;
use skills::SkillDispatcher;
use switch::SwitchBridge;
use wake_word::{oww::OpenWakeWord, WakeWordGate};

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let logs_dir = get_logs_dir();
    let use_file = std::fs::create_dir_all(&logs_dir).is_ok();

    let _guard: Option<tracing_appender::non_blocking::WorkerGuard>;
    if use_file {
        let file_appender = tracing_appender::rolling::daily(&logs_dir, "voxd.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
    } else {
        _guard = None;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("voxd starting");

    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("fatal configuration error: {e}");
            std::process::exit(1);
        }
    };

    // ── Audio Source / Sink ──────────────────────────────────────────
    let (producer, consumer) = audio_ring_buffer(None);
    let _capture_stream = match start_capture(producer, cfg.audio.input_device.as_deref(), cfg.audio.gain) {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("audio capture unavailable, running without a microphone: {e}");
            None
        }
    };
    let source = AudioSource::new(consumer, cfg.audio.frame_len);

    let sink = match AudioSink::new(cfg.audio.output_device.as_deref()) {
        Ok(sink) => sink,
        Err(e) => {
            error!("fatal: no audio output device available: {e}");
            std::process::exit(1);
        }
    };

    // Alarm ringing runs on its own output stream so it can play
    // independently of whatever the Dialog Controller's sink is doing.
    let ringing_sink = match AudioSink::new(cfg.audio.output_device.as_deref()) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!("alarm ringing output unavailable: {e}");
            Arc::new(AudioSink::new(None).expect("at least one audio output must be available"))
        }
    };

    // ── Wake word ─────────────────────────────────────────────────────
    let mut detector = OpenWakeWord::new();
    if let Some(dir) = &cfg.wake_word.model_dir {
        detector.load(std::path::Path::new(dir));
    }
    let wake_gate = WakeWordGate::new(
        detector,
        cfg.wake_word.threshold,
        cfg.wake_word.purge_frames,
        cfg.audio.frame_len,
    );

    // ── STT / TTS ─────────────────────────────────────────────────────
    let data_dir = config::paths::get_data_dir();
    let stt = match stt::create_stt_engine(
        &cfg.stt.adapter,
        &data_dir,
        cfg.stt.model_size.as_deref(),
        cfg.stt.api_key.as_deref(),
        cfg.stt.endpoint.as_deref(),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            warn!(
                "speech-to-text unavailable ({}: {e}), running without it; every turn will get the offline reply",
                cfg.stt.adapter
            );
            stt::SttAdapter::Null
        }
    };

    let tts_cache_dir = get_tts_cache_dir();
    let tts = build_tts(&cfg, &data_dir, &tts_cache_dir);
    let ringing_tts = Arc::new(build_tts(&cfg, &data_dir, &tts_cache_dir));

    let llm = LlmClient::new(
        &cfg.llm.endpoint,
        cfg.llm.api_key.as_deref().unwrap_or_default(),
        &cfg.llm.model,
        None,
        10,
    );

    let mut skills = SkillDispatcher::new();
    skills.set_enabled(cfg.skills.enabled);

    // ── Alarm store + scheduler ─────────────────────────────────────
    let db_path = cfg
        .alarm
        .db_path
        .as_ref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(get_alarm_db_path);
    let alarm_store = match AlarmStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "alarm store at {} unavailable ({e}), falling back to an in-memory store for this session",
                db_path.display()
            );
            Arc::new(AlarmStore::open_in_memory().expect("in-memory sqlite store must always open"))
        }
    };

    let ringing = RingingFlag::new();
    let scheduler = Scheduler::new(
        Arc::clone(&alarm_store),
        Duration::from_secs(cfg.alarm.tick_period_secs),
        ringing.clone(),
    );

    // ── Smart-switch bridge (optional) ───────────────────────────────
    // Config carries broker credentials only; device registration (mac,
    // key count, friendly name) isn't part of the config surface yet, so
    // the bridge connects with zero devices registered at boot.
    let switch = if cfg.switch.enabled {
        let (bridge, _reader) = SwitchBridge::connect(
            &cfg.switch.client_id,
            &cfg.switch.broker,
            cfg.switch.port,
            Duration::from_secs(cfg.switch.status_timeout_secs),
        );
        Some(bridge)
    } else {
        None
    };

    let controller = DialogController::new(
        &cfg, source, sink, wake_gate, stt, tts, llm, skills,
        Arc::clone(&alarm_store), ringing.clone(), switch,
    );

    let (alarm_tx, alarm_rx) = tokio::sync::mpsc::channel(8);
    let (sched_shutdown_tx, sched_shutdown_rx) = tokio::sync::mpsc::channel(1);
    let (dialog_shutdown_tx, dialog_shutdown_rx) = tokio::sync::mpsc::channel(1);

    let scheduler_task = tokio::spawn(scheduler.run(alarm_tx, sched_shutdown_rx));
    let ringing_task = tokio::spawn(dialog::run_ringing_worker(
        alarm_rx,
        ringing_sink,
        ringing_tts,
        ringing.clone(),
    ));
    let dialog_task = tokio::spawn(controller.run(dialog_shutdown_rx));

    info!("voxd ready");

    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to listen for ctrl-c; running until killed");
        let _ = tokio::join!(scheduler_task, ringing_task, dialog_task);
        return;
    }

    info!("shutdown requested, stopping subsystems");
    let _ = sched_shutdown_tx.send(()).await;
    let _ = dialog_shutdown_tx.send(()).await;
    ringing_task.abort();

    let _ = tokio::join!(scheduler_task, dialog_task);
    info!("voxd stopped");
}

fn build_tts(cfg: &config::Config, data_dir: &std::path::Path, cache_dir: &std::path::Path) -> tts::Tts {
    let default_engine = match tts::create_tts_engine(
        &cfg.tts.adapter,
        data_dir,
        cfg.tts.voice.as_deref(),
        cfg.tts.api_key.as_deref(),
        cfg.tts.endpoint.as_deref(),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            warn!("tts adapter '{}' unavailable ({e}), falling back to kokoro", cfg.tts.adapter);
            tts::kokoro::KokoroTts::new(&data_dir.join("models").join("kokoro"))
                .map(|e| Box::new(e) as Box<dyn tts::TtsEngine>)
                .unwrap_or_else(|_| Box::new(NullTts) as Box<dyn tts::TtsEngine>)
        }
    };

    let local_fallback: Option<Box<dyn tts::TtsEngine>> = if cfg.tts.adapter != "kokoro" {
        tts::kokoro::KokoroTts::new(&data_dir.join("models").join("kokoro"))
            .ok()
            .map(|e| Box::new(e) as Box<dyn tts::TtsEngine>)
    } else {
        None
    };

    tts::Tts::new(default_engine, local_fallback, cache_dir)
}

/// Silent last-resort engine so a fully offline, modelless box can still
/// boot and run through the dialog state machine without panicking on
/// every speak() call; every synthesis attempt fails cleanly instead.
struct NullTts;
impl tts::TtsEngine for NullTts {
    fn speak(
        &self,
        _text: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<Vec<f32>>> + Send + '_>> {
        Box::pin(async { anyhow::bail!("no text-to-speech engine is available") })
    }
    fn stop(&self) {}
    fn name(&self) -> String {
        "null".to_string()
    }
    fn sample_rate(&self) -> u32 {
        16_000
    }
}
