//! Sample-level helpers for assembling units: loudness, trimming, fades.
//!
//! Pure functions over mono f32 buffers.

use std::f32::consts::FRAC_PI_2;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Shape of the gain ramp used by fades and crossfades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    /// Constant-power (sin/cos) ramp.
    EqualPower,
}

impl FadeCurve {
    /// `(outgoing, incoming)` gains at position `t` in `[0, 1]`.
    pub fn gains(self, t: f32) -> (f32, f32) {
        match self {
            FadeCurve::Linear => (1.0 - t, t),
            FadeCurve::EqualPower => ((t * FRAC_PI_2).cos(), (t * FRAC_PI_2).sin()),
        }
    }
}

/// Loudness measure that units are brought to before assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    Off,
    Peak,
    #[default]
    Rms,
}

pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

pub fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

/// Locate the audible part of a recording.
///
/// The signal is cut into frames of `frame_ms`; frames whose RMS is more
/// than `top_db` below the loudest frame count as silence. Returns the range
/// from the first to the last audible frame, or an empty range for a silent
/// buffer. A non-positive `top_db` disables trimming.
pub fn trim_silence(samples: &[f32], sample_rate: u32, top_db: f32, frame_ms: u32) -> Range<usize> {
    if samples.is_empty() {
        return 0..0;
    }
    if !(top_db.is_finite() && top_db > 0.0) {
        return 0..samples.len();
    }

    let frame = ms_to_samples(frame_ms, sample_rate).max(1);
    let levels: Vec<f32> = samples.chunks(frame).map(rms).collect();
    let loudest = levels.iter().copied().fold(0.0_f32, f32::max);
    if loudest <= f32::EPSILON {
        return 0..0;
    }

    let threshold = loudest * 10f32.powf(-top_db / 20.0);
    let first = levels.iter().position(|&l| l >= threshold).unwrap_or(0);
    let last = levels.iter().rposition(|&l| l >= threshold).unwrap_or(first);

    first * frame..((last + 1) * frame).min(samples.len())
}

/// Gain that brings `samples` to `target` under `mode`, limited so the peak
/// does not exceed `ceiling` (ignored when `ceiling <= 0`).
///
/// Silent input gets unity gain.
pub fn normalization_gain(samples: &[f32], mode: Normalization, target: f32, ceiling: f32) -> f32 {
    let p = peak(samples);
    if mode == Normalization::Off || p <= f32::EPSILON {
        return 1.0;
    }

    let mut gain = match mode {
        Normalization::Peak => target / p,
        Normalization::Rms => {
            let r = rms(samples);
            if r <= f32::EPSILON {
                return 1.0;
            }
            target / r
        }
        Normalization::Off => 1.0,
    };

    if ceiling > 0.0 && gain * p > ceiling {
        gain = ceiling / p;
    }
    gain
}

/// Scale `samples` in place to the target level. Returns the applied gain.
///
/// Applying it twice with the same settings leaves the buffer unchanged
/// (up to float rounding).
pub fn normalize(samples: &mut [f32], mode: Normalization, target: f32, ceiling: f32) -> f32 {
    let gain = normalization_gain(samples, mode, target, ceiling);
    if (gain - 1.0).abs() > f32::EPSILON {
        samples.iter_mut().for_each(|s| *s *= gain);
    }
    gain
}

/// Ramp the first `len` samples up from silence.
pub fn fade_in(samples: &mut [f32], len: usize, curve: FadeCurve) {
    let n = len.min(samples.len());
    for (i, sample) in samples.iter_mut().take(n).enumerate() {
        let t = (i + 1) as f32 / (n as f32 + 1.0);
        *sample *= curve.gains(t).1;
    }
}

/// Ramp the last `len` samples down to silence.
pub fn fade_out(samples: &mut [f32], len: usize, curve: FadeCurve) {
    let n = len.min(samples.len());
    let start = samples.len() - n;
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        let t = (i + 1) as f32 / (n as f32 + 1.0);
        *sample *= curve.gains(t).0;
    }
}

/// Append `src` to `dst`, overlapping up to `crossfade_samples` samples.
///
/// The tail of `dst` fades out while the head of `src` fades in, so the
/// output is `overlap` samples shorter than a plain concatenation. Returns
/// the overlap actually used.
pub fn append_with_crossfade(
    dst: &mut Vec<f32>,
    src: &[f32],
    crossfade_samples: usize,
    curve: FadeCurve,
) -> usize {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    if overlap == 0 {
        dst.extend_from_slice(src);
        return 0;
    }

    let dst_start = dst.len() - overlap;
    for i in 0..overlap {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        let (out_gain, in_gain) = curve.gains(t);
        dst[dst_start + i] = dst[dst_start + i] * out_gain + src[i] * in_gain;
    }

    dst.extend_from_slice(&src[overlap..]);
    overlap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn converts_milliseconds() {
        assert_eq!(ms_to_samples(10, 44100), 441);
        assert_eq!(ms_to_samples(300, 16000), 4800);
        assert_eq!(ms_to_samples(0, 16000), 0);
    }

    #[test]
    fn measures_levels() {
        let dc = vec![0.5_f32; 100];
        assert!((peak(&dc) - 0.5).abs() < 1e-6);
        assert!((rms(&dc) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);

        let sine = tone(100.0, 16000, 16000, 1.0);
        assert!((rms(&sine) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn trims_leading_and_trailing_silence() {
        let mut samples = silence(1600);
        samples.extend(tone(200.0, 16000, 3200, 0.5));
        samples.extend(silence(800));

        let range = trim_silence(&samples, 16000, 35.0, 10);
        assert_eq!(range, 1600..4800);
    }

    #[test]
    fn trimming_keeps_quiet_tail_above_threshold() {
        let mut samples = tone(200.0, 16000, 1600, 0.5);
        samples.extend(tone(200.0, 16000, 1600, 0.05)); // -20 dB
        let range = trim_silence(&samples, 16000, 35.0, 10);
        assert_eq!(range, 0..3200);

        let range = trim_silence(&samples, 16000, 10.0, 10);
        assert_eq!(range, 0..1600);
    }

    #[test]
    fn silent_buffer_trims_to_nothing() {
        assert!(trim_silence(&silence(1000), 16000, 35.0, 10).is_empty());
        assert_eq!(trim_silence(&[0.3; 10], 16000, 0.0, 10), 0..10);
    }

    #[test]
    fn normalization_hits_target() {
        let mut samples = tone(200.0, 16000, 1600, 0.02);
        normalize(&mut samples, Normalization::Rms, 0.1, 0.98);
        assert!((rms(&samples) - 0.1).abs() < 1e-4);

        let mut samples = tone(200.0, 16000, 1600, 0.02);
        normalize(&mut samples, Normalization::Peak, 0.9, 0.98);
        assert!((peak(&samples) - 0.9).abs() < 1e-3);
    }

    #[test]
    fn normalization_respects_ceiling() {
        // Spiky signal: RMS target would push the peak far above 1.0.
        let mut samples = silence(1000);
        samples[10] = 0.5;
        normalize(&mut samples, Normalization::Rms, 0.1, 0.98);
        assert!((peak(&samples) - 0.98).abs() < 1e-5);
    }

    #[test]
    fn normalization_is_idempotent() {
        for mode in [Normalization::Peak, Normalization::Rms] {
            let mut once = tone(330.0, 16000, 4000, 0.3);
            once[5] = 0.95;
            normalize(&mut once, mode, 0.2, 0.98);

            let mut twice = once.clone();
            let gain = normalize(&mut twice, mode, 0.2, 0.98);
            assert!((gain - 1.0).abs() < 1e-4, "{mode:?}: gain {gain}");
            for (a, b) in once.iter().zip(&twice) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn silent_input_is_left_alone() {
        let mut samples = silence(10);
        assert_eq!(normalize(&mut samples, Normalization::Rms, 0.1, 0.98), 1.0);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fades_are_monotonic() {
        for curve in [FadeCurve::Linear, FadeCurve::EqualPower] {
            let mut up = vec![1.0_f32; 50];
            fade_in(&mut up, 20, curve);
            assert!(up[..20].windows(2).all(|w| w[0] <= w[1]));
            assert!(up[0] > 0.0 && up[19] < 1.0);
            assert_eq!(up[20], 1.0);

            let mut down = vec![1.0_f32; 50];
            fade_out(&mut down, 20, curve);
            assert!(down[30..].windows(2).all(|w| w[0] >= w[1]));
            assert_eq!(down[29], 1.0);
        }
    }

    #[test]
    fn crossfade_shortens_by_overlap() {
        let mut dst = vec![1.0_f32; 100];
        let src = vec![1.0_f32; 100];
        let used = append_with_crossfade(&mut dst, &src, 30, FadeCurve::Linear);
        assert_eq!(used, 30);
        assert_eq!(dst.len(), 170);
        // Linear ramps on equal signals keep the level constant.
        assert!(dst.iter().all(|&s| (s - 1.0).abs() < 1e-5));
    }

    #[test]
    fn crossfade_without_overlap_concatenates() {
        let mut dst = Vec::new();
        assert_eq!(append_with_crossfade(&mut dst, &[0.1, 0.2], 10, FadeCurve::Linear), 0);
        assert_eq!(dst, vec![0.1, 0.2]);
    }
}
