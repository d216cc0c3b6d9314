// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! EEG window processing: notch + bandpass filtering, quality indexing,
//! Morlet spectral power, band powers and the derived cognitive indices.

use crate::{
  downsample,
  downsample_factor,
  filter::{self, IirCoeffs},
  quality,
  wavelet,
};
use lxband_core::{
  SensorType,
  errors::DspError,
  message::{BandPowers, EegSample, ProcessedEeg, SignalQuality},
};

const SAMPLING_RATE: f64 = 250.0;
/// About eight seconds of signal; shorter windows skip processing entirely.
pub const MIN_SAMPLES: usize = 2000;
/// Windows with at least this many quality-masked samples get a spectrum and
/// a `good` quality verdict.
const GOOD_SAMPLE_TARGET: usize = 1000;
const QUALITY_THRESHOLD: f64 = 0.7;
const DOWNSAMPLE_TARGET: usize = 250;
const NOTCH_FREQ_HZ: f64 = 60.0;
const NOTCH_HALF_WIDTH_HZ: f64 = 1.0;
const NOTCH_TAPS: usize = 251;
const BAND_LOW_HZ: f64 = 1.0;
const BAND_HIGH_HZ: f64 = 45.0;
const MAX_SPECTRUM_FREQ: usize = 45;

/// Stateless per-window EEG processor. Filter coefficients are designed once
/// at construction; `process` is then pure over its input window.
pub struct EegProcessor {
  notch_taps: Vec<f64>,
  bandpass: IirCoeffs,
}

impl EegProcessor {
  pub fn new() -> Result<Self, DspError> {
    Ok(Self {
      notch_taps: filter::fir_notch(NOTCH_FREQ_HZ, NOTCH_HALF_WIDTH_HZ, SAMPLING_RATE, NOTCH_TAPS),
      bandpass: filter::butter_bandpass(4, BAND_LOW_HZ, BAND_HIGH_HZ, SAMPLING_RATE)?,
    })
  }

  /// Process one acquisition window into a frame. `timestamp` is the frame's
  /// wall-clock stamp (the worker passes its tick time).
  pub fn process(
    &self,
    samples: &[EegSample],
    timestamp: f64,
  ) -> Result<ProcessedEeg, DspError> {
    if samples.len() < MIN_SAMPLES {
      return Err(DspError::InsufficientData {
        sensor: SensorType::Eeg,
        have: samples.len(),
        need: MIN_SAMPLES,
      });
    }

    let ch1_raw: Vec<f64> = samples.iter().map(|s| s.ch1).collect();
    let ch2_raw: Vec<f64> = samples.iter().map(|s| s.ch2).collect();
    let ch1_leadoff = samples.iter().any(|s| s.leadoff_ch1);
    let ch2_leadoff = samples.iter().any(|s| s.leadoff_ch2);

    let ch1_filtered = self.filter_channel(&ch1_raw)?;
    let ch2_filtered = self.filter_channel(&ch2_raw)?;

    let ch1_amplitude = quality::amplitude_sqi(
      &ch1_filtered,
      quality::EEG_AMPLITUDE_WINDOW,
      quality::EEG_AMPLITUDE_THRESHOLD_UV,
    );
    let ch2_amplitude = quality::amplitude_sqi(
      &ch2_filtered,
      quality::EEG_AMPLITUDE_WINDOW,
      quality::EEG_AMPLITUDE_THRESHOLD_UV,
    );
    let ch1_frequency = quality::frequency_sqi(&ch1_filtered, SAMPLING_RATE, BAND_LOW_HZ, BAND_HIGH_HZ);
    let ch2_frequency = quality::frequency_sqi(&ch2_filtered, SAMPLING_RATE, BAND_LOW_HZ, BAND_HIGH_HZ);
    let ch1_sqi = quality::combined_sqi(&ch1_amplitude, &ch1_frequency);
    let ch2_sqi = quality::combined_sqi(&ch2_amplitude, &ch2_frequency);

    let ch1_mask: Vec<bool> = ch1_sqi.iter().map(|v| *v >= QUALITY_THRESHOLD).collect();
    let ch2_mask: Vec<bool> = ch2_sqi.iter().map(|v| *v >= QUALITY_THRESHOLD).collect();
    let good_samples = ch1_mask
      .iter()
      .zip(&ch2_mask)
      .filter(|(a, b)| **a && **b)
      .count();
    debug!(
      "EEG quality: {}/{} good samples",
      good_samples,
      samples.len()
    );

    let (frequencies, ch1_power, ch2_power) = if good_samples >= GOOD_SAMPLE_TARGET {
      let ch1_good = masked(&ch1_filtered, &ch1_mask);
      let ch2_good = masked(&ch2_filtered, &ch2_mask);
      let usable = ch1_good.len().min(ch2_good.len());
      let (freqs, p1) =
        wavelet::tfr_morlet_mean_power(&ch1_good[..usable], SAMPLING_RATE, MAX_SPECTRUM_FREQ);
      let (_, p2) =
        wavelet::tfr_morlet_mean_power(&ch2_good[..usable], SAMPLING_RATE, MAX_SPECTRUM_FREQ);
      (freqs, to_db(&p1), to_db(&p2))
    } else {
      (vec![], vec![], vec![])
    };

    let factor = downsample_factor(ch1_filtered.len(), DOWNSAMPLE_TARGET);
    let ch1_band_powers = compute_band_powers(&ch1_power, &frequencies);
    let ch2_band_powers = compute_band_powers(&ch2_power, &frequencies);

    let BandPowers { theta, alpha, beta, gamma, .. } = ch1_band_powers;
    let focus_index = guarded(beta, alpha + theta);
    let relaxation_index = guarded(alpha, alpha + beta);
    let stress_index = guarded(beta + gamma, alpha + theta);
    let hemispheric_balance = guarded(
      ch1_band_powers.alpha - ch2_band_powers.alpha,
      ch1_band_powers.alpha + ch2_band_powers.alpha,
    );
    let cognitive_load = guarded(theta, alpha);
    let emotional_stability = guarded(alpha + theta, gamma);

    Ok(ProcessedEeg {
      timestamp,
      ch1_filtered: downsample(&ch1_filtered, factor),
      ch2_filtered: downsample(&ch2_filtered, factor),
      ch1_leadoff,
      ch2_leadoff,
      ch1_sqi: downsample(&ch1_sqi, factor),
      ch2_sqi: downsample(&ch2_sqi, factor),
      ch1_power,
      ch2_power,
      frequencies,
      ch1_band_powers,
      ch2_band_powers,
      signal_quality: if good_samples >= GOOD_SAMPLE_TARGET {
        SignalQuality::Good
      } else {
        SignalQuality::Poor
      },
      good_samples_ratio: good_samples as f64 / samples.len() as f64,
      total_power: ch1_band_powers.total(),
      focus_index,
      relaxation_index,
      stress_index,
      hemispheric_balance,
      cognitive_load,
      emotional_stability,
    })
  }

  fn filter_channel(&self, raw: &[f64]) -> Result<Vec<f64>, DspError> {
    let notched = filter::filter_zero_phase_fir(&self.notch_taps, raw)?;
    filter::filtfilt(&self.bandpass, &notched)
  }
}

fn masked(data: &[f64], mask: &[bool]) -> Vec<f64> {
  data
    .iter()
    .zip(mask)
    .filter(|(_, keep)| **keep)
    .map(|(v, _)| *v)
    .collect()
}

fn to_db(power: &[f64]) -> Vec<f64> {
  power
    .iter()
    .map(|p| 10.0 * p.max(f64::MIN_POSITIVE).log10())
    .collect()
}

/// Mean power over each half-open band `[low, high)` of the spectrum.
fn compute_band_powers(power_db: &[f64], frequencies: &[f64]) -> BandPowers {
  let band_mean = |low: f64, high: f64| {
    let values: Vec<f64> = frequencies
      .iter()
      .zip(power_db)
      .filter(|(f, _)| **f >= low && **f < high)
      .map(|(_, p)| *p)
      .collect();
    if values.is_empty() {
      0.0
    } else {
      values.iter().sum::<f64>() / values.len() as f64
    }
  };
  BandPowers {
    delta: band_mean(1.0, 4.0),
    theta: band_mean(4.0, 8.0),
    alpha: band_mean(8.0, 13.0),
    beta: band_mean(13.0, 30.0),
    gamma: band_mean(30.0, 45.0),
  }
}

fn guarded(numerator: f64, denominator: f64) -> f64 {
  if denominator > 0.0 {
    numerator / denominator
  } else {
    0.0
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn alpha_window(n: usize) -> Vec<EegSample> {
    (0..n)
      .map(|i| {
        let t = i as f64 / SAMPLING_RATE;
        let v = 20.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin();
        EegSample {
          timestamp: t,
          ch1: v,
          ch2: v * 0.8,
          leadoff_ch1: false,
          leadoff_ch2: false,
        }
      })
      .collect()
  }

  #[test]
  fn test_insufficient_data_is_an_error() {
    let processor = EegProcessor::new().expect("Design succeeds");
    let result = processor.process(&alpha_window(100), 0.0);
    assert!(matches!(
      result,
      Err(DspError::InsufficientData { need: 2000, .. })
    ));
  }

  #[test]
  fn test_clean_alpha_window_is_good_quality() {
    let processor = EegProcessor::new().expect("Design succeeds");
    let frame = processor
      .process(&alpha_window(2000), 42.0)
      .expect("Processable window");
    assert_eq!(frame.signal_quality, SignalQuality::Good);
    assert_eq!(frame.frequencies.len(), 45);
    assert_eq!(frame.ch1_filtered.len(), 250);
    assert_eq!(frame.ch1_sqi.len(), 250);
    assert!((frame.timestamp - 42.0).abs() < f64::EPSILON);
    // Dominant band of a 10 Hz tone is alpha.
    assert!(frame.ch1_band_powers.alpha > frame.ch1_band_powers.delta);
    assert!(frame.ch1_band_powers.alpha > frame.ch1_band_powers.gamma);
  }

  #[test]
  fn test_saturated_window_is_poor_quality_without_spectrum() {
    let processor = EegProcessor::new().expect("Design succeeds");
    let samples: Vec<EegSample> = (0..2000)
      .map(|i| {
        let t = i as f64 / SAMPLING_RATE;
        // Way over the 100 uV amplitude threshold.
        let v = 5000.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin();
        EegSample {
          timestamp: t,
          ch1: v,
          ch2: v,
          leadoff_ch1: true,
          leadoff_ch2: false,
        }
      })
      .collect();
    let frame = processor.process(&samples, 0.0).expect("Processable window");
    assert_eq!(frame.signal_quality, SignalQuality::Poor);
    assert!(frame.frequencies.is_empty());
    assert!(frame.ch1_power.is_empty());
    assert!(frame.ch1_leadoff);
    assert!(!frame.ch2_leadoff);
    assert_eq!(frame.focus_index, 0.0);
  }

  #[test]
  fn test_guarded_division() {
    assert_eq!(guarded(1.0, 0.0), 0.0);
    assert_eq!(guarded(1.0, -2.0), 0.0);
    assert!((guarded(1.0, 2.0) - 0.5).abs() < f64::EPSILON);
  }
}
