//! Audio Source (spec §4.1, C1) via cpal.
//!
//! Opens the default (or named) input device, captures audio at its native
//! sample rate, resamples to 16 kHz mono, downmixes to one channel, applies
//! the configured gain, and converts to signed 16-bit frames pushed into a
//! ring buffer for `AudioSource::next_frame()` to consume. The source never
//! silently drops a frame of its own accord; a full ring buffer is the one
//! place audio can be lost, and that loss is the caller's backpressure
//! problem, not ours (mirrors `AudioDevice` semantics from spec §4.1).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{error, info};

use super::ring_buffer::{AudioConsumer, AudioProducer};

const TARGET_SAMPLE_RATE: u32 = 16_000;

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    native_rate: u32,
}

fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, String> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| format!("Failed to enumerate input devices: {e}"))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| format!("Input device not found: {name}"))?
    } else {
        host.default_input_device()
            .ok_or_else(|| "No default input device available".to_string())?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| format!("Failed to get default input config: {e}"))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(native_rate, channels, target = TARGET_SAMPLE_RATE, "input device config");

    Ok(CaptureConfig {
        device,
        stream_config,
        native_rate,
    })
}

/// Simple linear resampler from `from_rate` to `to_rate` (mono f32).
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

fn to_i16(samples: &[f32], gain: f32) -> Vec<i16> {
    samples
        .iter()
        .map(|s| ((s * gain).clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Start audio capture. Returns the cpal `Stream` (must be kept alive for
/// capture to continue — dropping it stops the device).
pub fn start_capture(
    mut producer: AudioProducer,
    device_name: Option<&str>,
    gain: f32,
) -> Result<Stream, String> {
    let cfg = resolve_device(device_name)?;
    let native_rate = cfg.native_rate;
    let channels = cfg.stream_config.channels;
    let needs_resample = native_rate != TARGET_SAMPLE_RATE;
    let needs_downmix = channels > 1;

    let stream = cfg
        .device
        .build_input_stream(
            &cfg.stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if needs_downmix {
                    to_mono(data, channels)
                } else {
                    data.to_vec()
                };

                let resampled = if needs_resample {
                    resample_linear(&mono, native_rate, TARGET_SAMPLE_RATE)
                } else {
                    mono
                };

                let frame = to_i16(&resampled, gain);
                let written = producer.push_slice(&frame);
                if written < frame.len() {
                    // Ring buffer full — oldest audio is lost; the consumer
                    // will catch up on its next poll.
                }
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build input stream: {e}"))?;

    stream.play().map_err(|e| format!("Failed to start input stream: {e}"))?;

    info!("Audio capture started");

    Ok(stream)
}

/// The Audio Source (C1): delivers fixed-size Frames from the capture ring
/// buffer. `next_frame()` blocks (via polling sleep) until a full frame of
/// `frame_len` samples is available, or returns `Err` if the capture stream
/// has died.
pub struct AudioSource {
    consumer: AudioConsumer,
    frame_len: usize,
    partial: Vec<i16>,
}

impl AudioSource {
    pub fn new(consumer: AudioConsumer, frame_len: usize) -> Self {
        Self {
            consumer,
            frame_len,
            partial: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Pull whatever is currently buffered into a `Vec<i16>`, without
    /// requiring a full frame. Used to purge audio accumulated during Idle.
    pub fn drain_pending(&mut self) -> Vec<i16> {
        self.partial.clear();
        self.consumer.drain_all()
    }

    /// Returns the next full frame if one is available; `None` otherwise.
    /// The caller is expected to poll this on a bounded interval (the
    /// Dialog Controller's tick) rather than busy-spin.
    pub fn try_next_frame(&mut self) -> Option<Vec<i16>> {
        let pending = self.consumer.drain_all();
        self.partial.extend_from_slice(&pending);
        if self.partial.len() >= self.frame_len {
            let frame: Vec<i16> = self.partial.drain(..self.frame_len).collect();
            Some(frame)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring_buffer::audio_ring_buffer;

    #[test]
    fn accumulates_partial_frames_until_full() {
        let (mut prod, cons) = audio_ring_buffer(Some(64));
        let mut source = AudioSource::new(cons, 8);

        prod.push_slice(&[1, 2, 3]);
        assert!(source.try_next_frame().is_none());

        prod.push_slice(&[4, 5, 6, 7, 8]);
        let frame = source.try_next_frame().unwrap();
        assert_eq!(frame, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn drain_pending_clears_partial_state() {
        let (mut prod, cons) = audio_ring_buffer(Some(64));
        let mut source = AudioSource::new(cons, 8);
        prod.push_slice(&[1, 2, 3]);
        let _ = source.try_next_frame();
        let drained = source.drain_pending();
        assert_eq!(drained, vec![1, 2, 3]);
        prod.push_slice(&[9, 9, 9, 9, 9, 9, 9, 9]);
        let frame = source.try_next_frame().unwrap();
        assert_eq!(frame, vec![9; 8]);
    }
}
