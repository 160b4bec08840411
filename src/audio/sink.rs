//! Audio Sink (spec §4.2, C2) via rodio.
//!
//! Plays a PCM buffer on a dedicated worker so playback never starves the
//! capture loop; `play()` returns immediately and `is_playing()` tracks
//! whether the sink is still draining. PCM is handed to rodio at its own
//! sample rate (Design Notes §9, "resample on output") and rodio performs
//! the conversion to the output device's native rate implicitly when it
//! mixes the source into the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::info;

pub struct AudioSink {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    playing: Arc<AtomicBool>,
}

impl AudioSink {
    pub fn new(device_name: Option<&str>) -> anyhow::Result<Self> {
        let (stream, stream_handle) = if let Some(name) = device_name {
            let host = cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| anyhow::anyhow!("Failed to enumerate output devices: {e}"))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false));

            match device {
                Some(dev) => {
                    let dev_name = dev.name().unwrap_or_else(|_| "unknown".into());
                    info!(device = %dev_name, "Selected output device");
                    OutputStream::try_from_device(&dev)
                        .map_err(|e| anyhow::anyhow!("Failed to open output device '{}': {}", name, e))?
                }
                None => {
                    info!(requested = %name, "Output device not found, falling back to default");
                    OutputStream::try_default()
                        .map_err(|e| anyhow::anyhow!("Failed to open default audio output: {}", e))?
                }
            }
        } else {
            OutputStream::try_default()
                .map_err(|e| anyhow::anyhow!("Failed to open audio output: {}", e))?
        };

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| anyhow::anyhow!("Failed to create audio sink: {}", e))?;

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
            playing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Clonable handle for external stop (e.g. the Barge-in Watcher).
    pub fn handle(&self) -> Arc<Sink> {
        Arc::clone(&self.sink)
    }

    /// Schedule a PCM buffer for playback; returns immediately (spec §4.2).
    pub fn play(&self, pcm: &[i16], sample_rate: u32) {
        let samples: Vec<f32> = pcm.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
        let source = rodio::buffer::SamplesBuffer::new(1, sample_rate, samples);
        self.playing.store(true, Ordering::SeqCst);
        self.sink.append(source);
    }

    /// Aborts the current buffer; `is_playing()` becomes false within one
    /// frame-time (spec §4.2, §5 cancellation guarantee).
    pub fn stop(&self) {
        self.sink.stop();
        self.playing.store(false, Ordering::SeqCst);
    }

    /// True until the buffer drains or `stop()` is called.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst) && !self.sink.empty()
    }
}

/// Generate a two-tone alarm ring at the given sample rate: `duration_secs`
/// per tone, two tones per cycle, looped `cycles` times. Used by
/// `play_alarm()` — the scheduler's ringing worker calls this directly
/// rather than through the sink so it can honor a shared stop flag between
/// cycles (spec §4.9, §5).
pub fn synth_ring_tone(sample_rate: u32, cycles: usize) -> Vec<i16> {
    const TONE_HZ_A: f32 = 880.0;
    const TONE_HZ_B: f32 = 660.0;
    const TONE_SECS: f32 = 0.3;

    let mut out = Vec::new();
    let tone_samples = (sample_rate as f32 * TONE_SECS) as usize;
    for _ in 0..cycles {
        for freq in [TONE_HZ_A, TONE_HZ_B] {
            for i in 0..tone_samples {
                let t = i as f32 / sample_rate as f32;
                let v = (2.0 * std::f32::consts::PI * freq * t).sin();
                out.push((v * i16::MAX as f32 * 0.5) as i16);
            }
        }
    }
    out
}

// SAFETY: OutputStream carries a `PhantomData<*mut ()>` marker from cpal's
// platform abstraction; the underlying device handles are only ever touched
// from the thread that owns the AudioSink.
unsafe impl Send for AudioSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_tone_has_expected_length() {
        let tone = synth_ring_tone(16_000, 2);
        // 2 cycles * 2 tones * 0.3s * 16000 samples/s
        assert_eq!(tone.len(), 2 * 2 * (16_000 * 3 / 10));
    }
}
