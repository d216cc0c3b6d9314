// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! PPG window processing: bandpass filtering, quality gating, peak-based
//! heart-rate variability and LF/HF spectral balance.
//!
//! The worker keeps the last good metric set and carries it forward through
//! windows that fail quality gating, so subscribers always see a filled
//! metric block next to the live filtered series.

use crate::{
  downsample,
  downsample_factor,
  filter::{self, IirCoeffs},
  mean,
  quality,
  spectral,
  std_dev,
};
use lxband_core::{
  SensorType,
  errors::DspError,
  message::{PpgSample, ProcessedPpg, SignalQuality},
};

const SAMPLING_RATE: f64 = 50.0;
/// About sixty seconds of signal.
pub const MIN_SAMPLES: usize = 3000;
const BAND_LOW_HZ: f64 = 0.5;
const BAND_HIGH_HZ: f64 = 5.0;
const GOOD_SQI_THRESHOLD: f64 = 0.95;
const GOOD_RATIO_GATE: f64 = 0.5;
const RECENT_WINDOW: usize = 1000;
const DOWNSAMPLE_TARGET: usize = 250;
/// RR intervals outside [300, 1200] ms are ectopics/artifacts for the
/// frequency-domain analysis.
const RR_CLEAN_MIN_MS: f64 = 300.0;
const RR_CLEAN_MAX_MS: f64 = 1200.0;
const MIN_CLEAN_RR: usize = 30;
const LF_BAND: (f64, f64) = (0.04, 0.15);
const HF_BAND: (f64, f64) = (0.15, 0.4);
const RR_RESAMPLE_HZ: f64 = 4.0;
const POWER_SCALE: f64 = 1e5;

/// Metric block carried forward across poor-quality windows.
#[derive(Debug, Clone, Default)]
struct HrvMetrics {
  bpm: f64,
  sdnn: f64,
  rmssd: f64,
  rr_intervals: Vec<f64>,
  pnn50: f64,
  sdsd: f64,
  hr_mad: f64,
  sd1: f64,
  sd2: f64,
  lf: f64,
  hf: f64,
  lf_hf: f64,
}

pub struct PpgProcessor {
  bandpass: IirCoeffs,
  last_good: Option<HrvMetrics>,
}

impl PpgProcessor {
  pub fn new() -> Result<Self, DspError> {
    Ok(Self {
      bandpass: filter::butter_bandpass(2, BAND_LOW_HZ, BAND_HIGH_HZ, SAMPLING_RATE)?,
      last_good: None,
    })
  }

  pub fn process(
    &mut self,
    samples: &[PpgSample],
    timestamp: f64,
  ) -> Result<ProcessedPpg, DspError> {
    if samples.len() < MIN_SAMPLES {
      return Err(DspError::InsufficientData {
        sensor: SensorType::Ppg,
        have: samples.len(),
        need: MIN_SAMPLES,
      });
    }

    let red: Vec<f64> = samples.iter().map(|s| s.red as f64).collect();
    let ir: Vec<f64> = samples.iter().map(|s| s.ir as f64).collect();
    let filtered = filter::filtfilt(&self.bandpass, &red)?;
    let sqi = quality::ppg_sqi(&filtered);

    let good_mask: Vec<bool> = sqi.iter().map(|v| *v >= GOOD_SQI_THRESHOLD).collect();
    let good_count = good_mask.iter().filter(|g| **g).count();
    let good_ratio = good_count as f64 / filtered.len() as f64;

    // The wire series shows the most recent stretch only.
    let recent_start = filtered.len().saturating_sub(RECENT_WINDOW);
    let filtered_recent = &filtered[recent_start..];
    let sqi_recent = &sqi[recent_start..];
    let factor = downsample_factor(filtered_recent.len(), DOWNSAMPLE_TARGET);

    let (metrics, signal_quality) = if good_ratio >= GOOD_RATIO_GATE {
      let good_signal: Vec<f64> = filtered
        .iter()
        .zip(&good_mask)
        .filter(|(_, keep)| **keep)
        .map(|(v, _)| *v)
        .collect();
      match analyze_hrv(&good_signal) {
        Ok(metrics) => {
          self.last_good = Some(metrics.clone());
          (metrics, SignalQuality::Good)
        }
        Err(e) => {
          warn!("PPG HRV analysis failed, carrying last good metrics: {}", e);
          (self.last_good.clone().unwrap_or_default(), SignalQuality::Poor)
        }
      }
    } else {
      (self.last_good.clone().unwrap_or_default(), SignalQuality::Poor)
    };

    Ok(ProcessedPpg {
      timestamp,
      filtered_ppg: downsample(filtered_recent, factor),
      ppg_sqi: downsample(sqi_recent, factor),
      bpm: metrics.bpm,
      sdnn: metrics.sdnn,
      rmssd: metrics.rmssd,
      signal_quality,
      red_mean: mean(&red),
      ir_mean: mean(&ir),
      rr_intervals: metrics.rr_intervals,
      pnn50: metrics.pnn50,
      sdsd: metrics.sdsd,
      hr_mad: metrics.hr_mad,
      sd1: metrics.sd1,
      sd2: metrics.sd2,
      lf: metrics.lf,
      hf: metrics.hf,
      lf_hf: metrics.lf_hf,
    })
  }
}

/// Peak-based HRV over a quality-masked signal.
fn analyze_hrv(signal: &[f64]) -> Result<HrvMetrics, DspError> {
  let peaks = detect_peaks(signal, SAMPLING_RATE)?;
  if peaks.len() < 3 {
    return Err(DspError::NumericalError(format!(
      "only {} pulse peaks detected",
      peaks.len()
    )));
  }
  let rr: Vec<f64> = peaks
    .windows(2)
    .map(|pair| (pair[1] - pair[0]) as f64 / SAMPLING_RATE * 1000.0)
    .collect();
  let rr_mean = mean(&rr);
  if rr_mean <= 0.0 {
    return Err(DspError::NumericalError("degenerate RR series".to_owned()));
  }

  let diffs: Vec<f64> = rr.windows(2).map(|pair| pair[1] - pair[0]).collect();
  let sdnn = std_dev(&rr);
  let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len().max(1) as f64).sqrt();
  let sdsd = std_dev(&diffs);
  let pnn50 = if diffs.is_empty() {
    0.0
  } else {
    diffs.iter().filter(|d| d.abs() > 50.0).count() as f64 / diffs.len() as f64 * 100.0
  };
  let hr_mad = median_absolute_deviation(&rr);
  // Poincare geometry.
  let sd1 = (0.5 * sdsd * sdsd).sqrt();
  let sd2_sq = 2.0 * sdnn * sdnn - 0.5 * sdsd * sdsd;
  let sd2 = if sd2_sq > 0.0 { sd2_sq.sqrt() } else { 0.0 };

  let rr_cleaned: Vec<f64> = rr
    .iter()
    .copied()
    .filter(|r| (RR_CLEAN_MIN_MS..=RR_CLEAN_MAX_MS).contains(r))
    .collect();
  let (lf, hf, lf_hf) = if rr_cleaned.len() >= MIN_CLEAN_RR {
    compute_lf_hf(&rr_cleaned)
  } else {
    (0.0, 0.0, 0.0)
  };

  Ok(HrvMetrics {
    bpm: 60_000.0 / rr_mean,
    sdnn,
    rmssd,
    rr_intervals: rr,
    pnn50,
    sdsd,
    hr_mad,
    sd1,
    sd2,
    lf,
    hf,
    lf_hf,
  })
}

/// Adaptive-threshold peak detection: candidate thresholds are a rolling
/// mean raised by a percentage of the signal's mean excursion; the threshold
/// whose beat rate lands in a physiological range with the steadiest RR
/// series wins.
fn detect_peaks(signal: &[f64], fs: f64) -> Result<Vec<usize>, DspError> {
  if signal.len() < fs as usize * 2 {
    return Err(DspError::NumericalError(
      "signal too short for peak detection".to_owned(),
    ));
  }
  let rolling = rolling_mean(signal, (0.75 * fs) as usize);
  let excursion = mean(&signal.iter().map(|v| v.abs()).collect::<Vec<f64>>());

  let mut best: Option<(f64, Vec<usize>)> = None;
  for ma_perc in [5.0, 10.0, 20.0, 30.0, 50.0, 70.0, 100.0, 150.0, 200.0, 300.0] {
    let threshold: Vec<f64> = rolling
      .iter()
      .map(|m| m + excursion * ma_perc / 100.0)
      .collect();
    let peaks = peaks_above(signal, &threshold);
    if peaks.len() < 3 {
      continue;
    }
    let rr: Vec<f64> = peaks
      .windows(2)
      .map(|pair| (pair[1] - pair[0]) as f64 / fs * 1000.0)
      .collect();
    let bpm = 60_000.0 / mean(&rr);
    if !(40.0..=180.0).contains(&bpm) {
      continue;
    }
    let spread = std_dev(&rr);
    if best.as_ref().is_none_or(|(s, _)| spread < *s) {
      best = Some((spread, peaks));
    }
  }
  best
    .map(|(_, peaks)| peaks)
    .ok_or_else(|| DspError::NumericalError("no plausible beat rate found".to_owned()))
}

/// Argmax of each contiguous region where the signal exceeds the threshold.
fn peaks_above(signal: &[f64], threshold: &[f64]) -> Vec<usize> {
  let mut peaks = Vec::new();
  let mut region_start: Option<usize> = None;
  for i in 0..signal.len() {
    if signal[i] > threshold[i] {
      if region_start.is_none() {
        region_start = Some(i);
      }
    } else if let Some(start) = region_start.take() {
      let peak = (start..i)
        .max_by(|&a, &b| signal[a].partial_cmp(&signal[b]).expect("No NaN samples"))
        .expect("Non-empty region");
      peaks.push(peak);
    }
  }
  if let Some(start) = region_start {
    let peak = (start..signal.len())
      .max_by(|&a, &b| signal[a].partial_cmp(&signal[b]).expect("No NaN samples"))
      .expect("Non-empty region");
    peaks.push(peak);
  }
  peaks
}

fn rolling_mean(signal: &[f64], window: usize) -> Vec<f64> {
  let window = window.max(1);
  let half = window / 2;
  (0..signal.len())
    .map(|i| {
      let start = i.saturating_sub(half);
      let end = (i + half + 1).min(signal.len());
      mean(&signal[start..end])
    })
    .collect()
}

fn median_absolute_deviation(data: &[f64]) -> f64 {
  let med = median(data);
  let deviations: Vec<f64> = data.iter().map(|v| (v - med).abs()).collect();
  median(&deviations)
}

fn median(data: &[f64]) -> f64 {
  if data.is_empty() {
    return 0.0;
  }
  let mut sorted = data.to_vec();
  sorted.sort_by(|a, b| a.partial_cmp(b).expect("No NaN values"));
  let mid = sorted.len() / 2;
  if sorted.len() % 2 == 0 {
    (sorted[mid - 1] + sorted[mid]) / 2.0
  } else {
    sorted[mid]
  }
}

/// LF/HF band powers from an RR series: resample to an even 4 Hz grid,
/// Welch PSD, trapezoidal integration per band, scaled by 1e5.
fn compute_lf_hf(rr_ms: &[f64]) -> (f64, f64, f64) {
  if rr_ms.len() < 4 {
    return (0.0, 0.0, 0.0);
  }
  let rr_s: Vec<f64> = rr_ms.iter().map(|r| r / 1000.0).collect();
  let mut t = Vec::with_capacity(rr_s.len());
  let mut acc = 0.0;
  for r in &rr_s {
    acc += r;
    t.push(acc);
  }
  let step = 1.0 / RR_RESAMPLE_HZ;
  let mut t_interp = Vec::new();
  let mut ti = t[0];
  while ti < t[t.len() - 1] {
    t_interp.push(ti);
    ti += step;
  }
  if t_interp.len() < 4 {
    return (0.0, 0.0, 0.0);
  }
  let rr_interp: Vec<f64> = t_interp.iter().map(|ti| interp(*ti, &t, &rr_s)).collect();

  let (freqs, psd) = spectral::welch(&rr_interp, RR_RESAMPLE_HZ, 256.min(rr_interp.len()));
  let band_integral = |low: f64, high: f64| {
    let pairs: Vec<(f64, f64)> = freqs
      .iter()
      .zip(&psd)
      .filter(|(f, _)| **f >= low && **f < high)
      .map(|(f, p)| (*f, *p))
      .collect();
    let fx: Vec<f64> = pairs.iter().map(|(f, _)| *f).collect();
    let px: Vec<f64> = pairs.iter().map(|(_, p)| *p).collect();
    spectral::trapezoid(&px, &fx) * POWER_SCALE
  };
  let lf = band_integral(LF_BAND.0, LF_BAND.1);
  let hf = band_integral(HF_BAND.0, HF_BAND.1);
  let lf_hf = if hf > 0.0 { lf / hf } else { 0.0 };
  (lf, hf, lf_hf)
}

/// Piecewise-linear interpolation with edge clamping.
fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
  if x <= xs[0] {
    return ys[0];
  }
  if x >= xs[xs.len() - 1] {
    return ys[ys.len() - 1];
  }
  let i = xs.partition_point(|v| *v <= x);
  let (x0, x1) = (xs[i - 1], xs[i]);
  let (y0, y1) = (ys[i - 1], ys[i]);
  if x1 == x0 {
    y0
  } else {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  /// Synthetic pulse train at a given heart rate with small baseline noise.
  fn pulse_window(bpm: f64, n: usize) -> Vec<PpgSample> {
    let period = 60.0 / bpm;
    (0..n)
      .map(|i| {
        let t = i as f64 / SAMPLING_RATE;
        let phase = (t % period) / period;
        // Narrow systolic peak plus a soft diastolic hump.
        let pulse = (-((phase - 0.15) / 0.05).powi(2)).exp() * 30.0
          + (-((phase - 0.5) / 0.2).powi(2)).exp() * 8.0;
        let value = 100_000.0 + pulse;
        PpgSample {
          timestamp: t,
          red: value as u32,
          ir: (value * 0.9) as u32,
        }
      })
      .collect()
  }

  #[test]
  fn test_insufficient_data_is_an_error() {
    let mut processor = PpgProcessor::new().expect("Design succeeds");
    assert!(matches!(
      processor.process(&pulse_window(60.0, 100), 0.0),
      Err(DspError::InsufficientData { need: 3000, .. })
    ));
  }

  #[test]
  fn test_pulse_train_yields_plausible_bpm() {
    let mut processor = PpgProcessor::new().expect("Design succeeds");
    let frame = processor
      .process(&pulse_window(60.0, 3000), 7.0)
      .expect("Processable window");
    assert_eq!(frame.signal_quality, SignalQuality::Good);
    assert!(
      (frame.bpm - 60.0).abs() < 10.0,
      "bpm was {} instead of ~60",
      frame.bpm
    );
    assert!(!frame.rr_intervals.is_empty());
    assert!(frame.filtered_ppg.len() <= 251);
    assert!(frame.red_mean > 99_000.0);
  }

  #[test]
  fn test_poor_window_carries_forward_last_good() {
    let mut processor = PpgProcessor::new().expect("Design succeeds");
    let good = processor
      .process(&pulse_window(60.0, 3000), 1.0)
      .expect("Processable window");

    // Huge swings push the amplitude SQI below its threshold everywhere.
    let noisy: Vec<PpgSample> = (0..3000)
      .map(|i| {
        let t = i as f64 / SAMPLING_RATE;
        let v = 100_000.0 + 5_000.0 * (2.0 * std::f64::consts::PI * 1.0 * t).sin();
        PpgSample {
          timestamp: t,
          red: v as u32,
          ir: v as u32,
        }
      })
      .collect();
    let poor = processor.process(&noisy, 2.0).expect("Processable window");
    assert_eq!(poor.signal_quality, SignalQuality::Poor);
    assert!((poor.bpm - good.bpm).abs() < f64::EPSILON);
    assert!((poor.sdnn - good.sdnn).abs() < f64::EPSILON);
  }

  #[test]
  fn test_lf_hf_requires_enough_clean_rr() {
    let rr = vec![800.0; 10];
    assert_eq!(compute_lf_hf(&rr).0, 0.0);
  }

  #[test]
  fn test_interp_clamps_edges() {
    let xs = vec![1.0, 2.0, 3.0];
    let ys = vec![10.0, 20.0, 30.0];
    assert_eq!(interp(0.0, &xs, &ys), 10.0);
    assert_eq!(interp(5.0, &xs, &ys), 30.0);
    assert!((interp(2.5, &xs, &ys) - 25.0).abs() < 1e-12);
  }
}
