//! WAV I/O (spec §6): mono signed-16-bit PCM RIFF files for the TTS cache,
//! alarm tones, and test fixtures. Headers must be written bit-exactly, so
//! this wraps `hound` rather than hand-rolling RIFF chunks.

use std::io::Cursor;
use std::path::Path;

use crate::error::VoiceError;

pub fn write_wav(path: &Path, pcm: &[i16], sample_rate: u32) -> Result<(), VoiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| VoiceError::Audio(format!("wav create {}: {e}", path.display())))?;
    for &s in pcm {
        writer
            .write_sample(s)
            .map_err(|e| VoiceError::Audio(format!("wav write: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| VoiceError::Audio(format!("wav finalize: {e}")))?;
    Ok(())
}

pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32), VoiceError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| VoiceError::Audio(format!("wav open {}: {e}", path.display())))?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    let samples = samples.map_err(|e| VoiceError::Audio(format!("wav read: {e}")))?;
    Ok((samples, sample_rate))
}

/// Encodes PCM to an in-memory WAV byte buffer (used by the TTS cache,
/// which stores the whole file rather than a path).
pub fn encode_wav(pcm: &[i16], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec)
            .map_err(|e| VoiceError::Audio(format!("wav encode: {e}")))?;
        for &s in pcm {
            writer
                .write_sample(s)
                .map_err(|e| VoiceError::Audio(format!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::Audio(format!("wav finalize: {e}")))?;
    }
    Ok(buf.into_inner())
}

pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32), VoiceError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| VoiceError::Audio(format!("wav decode: {e}")))?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    let samples = samples.map_err(|e| VoiceError::Audio(format!("wav read: {e}")))?;
    Ok((samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_roundtrip_preserves_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wav");
        let pcm: Vec<i16> = (0..1000).map(|i| (i % 300) as i16).collect();
        write_wav(&path, &pcm, 16_000).unwrap();
        let (read_back, sr) = read_wav(&path).unwrap();
        assert_eq!(sr, 16_000);
        assert_eq!(read_back, pcm);
    }

    #[test]
    fn encode_decode_roundtrip_is_byte_stable() {
        let pcm = vec![100i16, -100, 0, 32000, -32000];
        let bytes1 = encode_wav(&pcm, 22_050).unwrap();
        let (decoded, sr) = decode_wav(&bytes1).unwrap();
        assert_eq!(decoded, pcm);
        assert_eq!(sr, 22_050);
        let bytes2 = encode_wav(&decoded, sr).unwrap();
        assert_eq!(bytes1, bytes2);
    }
}
