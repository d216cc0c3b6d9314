// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Signal-quality indices in [0, 1], computed over sliding windows.
//!
//! The combined EEG SQI currently weights amplitude at 1.0 and frequency at
//! 0.0; the frequency series is still computed and carried on every frame so
//! the weights can change without touching downstream consumers.

use crate::spectral::{band_power_ratio, welch};

pub const AMPLITUDE_SQI_WEIGHT: f64 = 1.0;
pub const FREQUENCY_SQI_WEIGHT: f64 = 0.0;

pub const EEG_AMPLITUDE_WINDOW: usize = 10;
pub const EEG_AMPLITUDE_THRESHOLD_UV: f64 = 100.0;
pub const EEG_FREQUENCY_WINDOW: usize = 50;
pub const PPG_AMPLITUDE_WINDOW: usize = 25;
pub const PPG_AMPLITUDE_THRESHOLD: f64 = 50.0;

/// Amplitude SQI: per window, the fraction of samples whose magnitude stays
/// under `threshold`. Each sample takes the value of the last window that
/// covered it, matching the overlapped write-back of the reference pipeline.
pub fn amplitude_sqi(data: &[f64], window: usize, threshold: f64) -> Vec<f64> {
  let mut sqi = vec![0.0; data.len()];
  if data.len() < window || window == 0 {
    return sqi;
  }
  for start in 0..=(data.len() - window) {
    let good = data[start..start + window]
      .iter()
      .filter(|x| x.abs() < threshold)
      .count();
    let value = good as f64 / window as f64;
    for slot in &mut sqi[start..start + window] {
      *slot = value;
    }
  }
  sqi
}

/// Frequency SQI: per window, the ratio of band power in `[low, high]` Hz to
/// total power from a Welch PSD with `nperseg = min(32, window)`.
pub fn frequency_sqi(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
  let window = EEG_FREQUENCY_WINDOW;
  let mut sqi = vec![0.0; data.len()];
  if data.len() < window {
    return sqi;
  }
  let nperseg = 32.min(window);
  for start in 0..=(data.len() - window) {
    let (freqs, psd) = welch(&data[start..start + window], fs, nperseg);
    let value = band_power_ratio(&freqs, &psd, low, high);
    for slot in &mut sqi[start..start + window] {
      *slot = value;
    }
  }
  sqi
}

/// Weighted combination of the amplitude and frequency series.
pub fn combined_sqi(amplitude: &[f64], frequency: &[f64]) -> Vec<f64> {
  amplitude
    .iter()
    .zip(frequency)
    .map(|(a, f)| AMPLITUDE_SQI_WEIGHT * a + FREQUENCY_SQI_WEIGHT * f)
    .collect()
}

/// PPG amplitude SQI with its own window and threshold.
pub fn ppg_sqi(data: &[f64]) -> Vec<f64> {
  amplitude_sqi(data, PPG_AMPLITUDE_WINDOW, PPG_AMPLITUDE_THRESHOLD)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_amplitude_sqi_clean_signal() {
    let data = vec![10.0; 100];
    let sqi = amplitude_sqi(&data, EEG_AMPLITUDE_WINDOW, EEG_AMPLITUDE_THRESHOLD_UV);
    assert!(sqi.iter().all(|v| (*v - 1.0).abs() < f64::EPSILON));
  }

  #[test]
  fn test_amplitude_sqi_flags_artifacts() {
    let mut data = vec![10.0; 100];
    for sample in data.iter_mut().skip(40).take(20) {
      *sample = 500.0;
    }
    let sqi = amplitude_sqi(&data, EEG_AMPLITUDE_WINDOW, EEG_AMPLITUDE_THRESHOLD_UV);
    assert_eq!(sqi[50], 0.0);
    assert!((sqi[0] - 1.0).abs() < f64::EPSILON);
  }

  #[test]
  fn test_amplitude_sqi_short_input() {
    assert_eq!(amplitude_sqi(&[1.0; 5], 10, 100.0), vec![0.0; 5]);
  }

  #[test]
  fn test_combined_sqi_uses_amplitude_only() {
    let combined = combined_sqi(&[0.8, 0.6], &[0.1, 0.2]);
    assert!((combined[0] - 0.8).abs() < f64::EPSILON);
    assert!((combined[1] - 0.6).abs() < f64::EPSILON);
  }

  #[test]
  fn test_frequency_sqi_prefers_inband_signal() {
    let fs = 250.0;
    let inband: Vec<f64> = (0..200)
      .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
      .collect();
    let sqi = frequency_sqi(&inband, fs, 1.0, 45.0);
    assert!(sqi[100] > 0.8);
  }
}
