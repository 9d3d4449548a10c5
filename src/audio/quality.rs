//! Audio quality heuristics computed from a decoded sample buffer.
//!
//! Two independent metric groups are produced:
//!
//! * an SNR estimate based on short-time energy, where frames above a
//!   percentile of the energy distribution are treated as signal and the rest
//!   as noise;
//! * zero-crossing-rate statistics (max, min and average over frames).
//!
//! Either group may fail on its own; the failure is logged and the affected
//! fields stay `None` while the other group is still reported.

use serde::{Deserialize, Serialize};

use crate::audio::decoder::DecodedAudio;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QualityError {
    #[error("audio buffer is empty")]
    EmptyBuffer,
    #[error("invalid frame configuration: frame length {frame_length}, hop length {hop_length}")]
    InvalidFrame {
        frame_length: usize,
        hop_length: usize,
    },
    #[error("degenerate energy split: {signal} signal frames, {noise} noise frames")]
    EmptyPartition { signal: usize, noise: usize },
    #[error("SNR is not finite ({0})")]
    NonFinite(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub window_size_s: f64,
    pub hop_size_s: f64,
    pub snr_percentile: f64,
    pub zcr_frame_length: usize,
    pub zcr_hop_length: usize,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            window_size_s: 0.025,
            hop_size_s: 0.010,
            snr_percentile: 95.0,
            zcr_frame_length: 2048,
            zcr_hop_length: 512,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub snr_db: Option<f64>,
    pub zcr_max: Option<f64>,
    pub zcr_min: Option<f64>,
    pub zcr_avg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZcrStats {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
}

pub struct AudioQualityAnalyzer {
    settings: QualitySettings,
}

impl AudioQualityAnalyzer {
    pub fn new(settings: QualitySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    pub fn analyze_decoded(&self, audio: &DecodedAudio) -> QualityMetrics {
        self.analyze(&audio.to_mono(), audio.sample_rate())
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> QualityMetrics {
        let mut metrics = QualityMetrics::default();

        match estimate_snr(samples, sample_rate, &self.settings) {
            Ok(snr) => metrics.snr_db = Some(snr),
            Err(e) => log::error!("Error calculating SNR: {}", e),
        }

        match zero_crossing_stats(
            samples,
            self.settings.zcr_frame_length,
            self.settings.zcr_hop_length,
        ) {
            Ok(stats) => {
                metrics.zcr_max = Some(stats.max);
                metrics.zcr_min = Some(stats.min);
                metrics.zcr_avg = Some(stats.avg);
            }
            Err(e) => log::error!("Error calculating zero crossings: {}", e),
        }

        metrics
    }
}

impl Default for AudioQualityAnalyzer {
    fn default() -> Self {
        Self::new(QualitySettings::default())
    }
}

pub fn estimate_snr(
    samples: &[f32],
    sample_rate: u32,
    settings: &QualitySettings,
) -> Result<f64, QualityError> {
    let frame_length = (sample_rate as f64 * settings.window_size_s).round() as usize;
    let hop_length = (sample_rate as f64 * settings.hop_size_s).round() as usize;
    let energy = short_time_energy(samples, frame_length, hop_length)?;

    let threshold = percentile(&energy, settings.snr_percentile);
    let (signal, noise): (Vec<f64>, Vec<f64>) = energy.iter().partition(|&&e| e > threshold);

    if signal.is_empty() || noise.is_empty() {
        return Err(QualityError::EmptyPartition {
            signal: signal.len(),
            noise: noise.len(),
        });
    }

    let snr = 10.0 * (mean(&signal) / mean(&noise)).log10();
    if !snr.is_finite() {
        return Err(QualityError::NonFinite(snr));
    }
    Ok(snr)
}

/// Root-mean-square energy per frame. Frames are centered on multiples of
/// `hop_length`, so the buffer is padded with half a frame of silence on each
/// side.
pub fn short_time_energy(
    samples: &[f32],
    frame_length: usize,
    hop_length: usize,
) -> Result<Vec<f64>, QualityError> {
    let frames = centered_frames(samples, frame_length, hop_length, Padding::Zero)?;
    Ok(frames
        .map(|frame| {
            let power: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum();
            (power / frame_length as f64).sqrt()
        })
        .collect())
}

/// Fraction of sign changes per frame. Frames are centered with edge padding;
/// values within 1e-10 of zero count as zero, and zero counts as positive.
pub fn zero_crossing_rates(
    samples: &[f32],
    frame_length: usize,
    hop_length: usize,
) -> Result<Vec<f64>, QualityError> {
    const THRESHOLD: f32 = 1e-10;

    let frames = centered_frames(samples, frame_length, hop_length, Padding::Edge)?;
    Ok(frames
        .map(|frame| {
            let negative = |x: f32| x < -THRESHOLD;
            let crossings = frame
                .windows(2)
                .filter(|pair| negative(pair[0]) != negative(pair[1]))
                .count();
            crossings as f64 / frame_length as f64
        })
        .collect())
}

pub fn zero_crossing_stats(
    samples: &[f32],
    frame_length: usize,
    hop_length: usize,
) -> Result<ZcrStats, QualityError> {
    let rates = zero_crossing_rates(samples, frame_length, hop_length)?;
    let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
    Ok(ZcrStats {
        max,
        min,
        avg: mean(&rates),
    })
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Clone, Copy)]
enum Padding {
    Zero,
    Edge,
}

fn centered_frames(
    samples: &[f32],
    frame_length: usize,
    hop_length: usize,
    padding: Padding,
) -> Result<impl Iterator<Item = Vec<f32>> + '_, QualityError> {
    if samples.is_empty() {
        return Err(QualityError::EmptyBuffer);
    }
    if frame_length == 0 || hop_length == 0 {
        return Err(QualityError::InvalidFrame {
            frame_length,
            hop_length,
        });
    }

    let pad = frame_length / 2;
    let padded_len = samples.len() + 2 * pad;
    if padded_len < frame_length {
        return Err(QualityError::InvalidFrame {
            frame_length,
            hop_length,
        });
    }
    let n_frames = 1 + (padded_len - frame_length) / hop_length;

    let (first, last) = (samples[0], samples[samples.len() - 1]);
    let sample_at = move |i: usize| -> f32 {
        if i < pad {
            match padding {
                Padding::Zero => 0.0,
                Padding::Edge => first,
            }
        } else if i - pad >= samples.len() {
            match padding {
                Padding::Zero => 0.0,
                Padding::Edge => last,
            }
        } else {
            samples[i - pad]
        }
    };

    Ok((0..n_frames).map(move |f| {
        let start = f * hop_length;
        (start..start + frame_length).map(sample_at).collect()
    }))
}
