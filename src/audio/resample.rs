//! Shared linear resampler for signed-16-bit PCM, used wherever a consumer
//! needs a different rate than the producer handed it (e.g. whisper.cpp's
//! fixed 16 kHz requirement). Mirrors the float resampler in `capture`.

pub fn linear_resample(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0) as f32;
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0 as i16) as f32;
        output.push((s0 + frac * (s1 - s0)) as i16);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![1i16, 2, 3];
        assert_eq!(linear_resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn downsamples_to_expected_length() {
        let input: Vec<i16> = (0..320).collect();
        let out = linear_resample(&input, 32_000, 16_000);
        assert_eq!(out.len(), 160);
    }
}
