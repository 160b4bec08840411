//! Audio Source, Audio Sink, Adaptive Noise Estimator (spec §4.1-4.3).

pub mod capture;
pub mod noise;
pub mod resample;
pub mod ring_buffer;
pub mod sink;

pub use capture::{list_devices, start_capture, AudioSource};
pub use noise::NoiseEstimator;
pub use ring_buffer::audio_ring_buffer;
pub use sink::AudioSink;
