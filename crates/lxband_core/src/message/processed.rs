// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Processed frames emitted by the DSP workers, one per processing interval.
//!
//! Field names match the processed-data files written by recording sessions;
//! treat them as a stable on-disk format.

use serde::{Deserialize, Serialize};

/// Overall window quality verdict carried on EEG and PPG frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignalQuality {
  Good,
  Poor,
}

/// Coarse activity classification from accelerometer movement magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityState {
  Stationary,
  Sitting,
  Walking,
  Running,
}

/// Battery charge bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatteryStatus {
  High,
  Medium,
  Low,
}

/// Mean spectral power per canonical EEG band, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandPowers {
  pub delta: f64,
  pub theta: f64,
  pub alpha: f64,
  pub beta: f64,
  pub gamma: f64,
}

impl BandPowers {
  pub fn total(&self) -> f64 {
    self.delta + self.theta + self.alpha + self.beta + self.gamma
  }
}

/// One EEG processing window: zero-phase filtered series (down-sampled to
/// 250 points), per-channel SQI series, Morlet power spectrum over 1-45 Hz,
/// band powers and the derived cognitive indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEeg {
  pub timestamp: f64,
  pub ch1_filtered: Vec<f64>,
  pub ch2_filtered: Vec<f64>,
  /// True if any sample in the window had the channel 1 electrode off.
  pub ch1_leadoff: bool,
  pub ch2_leadoff: bool,
  pub ch1_sqi: Vec<f64>,
  pub ch2_sqi: Vec<f64>,
  /// Per-frequency power in dB, one value per entry of `frequencies`. Empty
  /// when the window had too few good samples for spectral analysis.
  pub ch1_power: Vec<f64>,
  pub ch2_power: Vec<f64>,
  pub frequencies: Vec<f64>,
  pub ch1_band_powers: BandPowers,
  pub ch2_band_powers: BandPowers,
  pub signal_quality: SignalQuality,
  pub good_samples_ratio: f64,
  pub total_power: f64,
  pub focus_index: f64,
  pub relaxation_index: f64,
  pub stress_index: f64,
  pub hemispheric_balance: f64,
  pub cognitive_load: f64,
  pub emotional_stability: f64,
}

/// One PPG processing window: filtered red-channel series, SQI series and
/// the HRV metric set. Metric fields carry the last good window's values
/// when the current window failed quality gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPpg {
  pub timestamp: f64,
  pub filtered_ppg: Vec<f64>,
  pub ppg_sqi: Vec<f64>,
  pub bpm: f64,
  pub sdnn: f64,
  pub rmssd: f64,
  pub signal_quality: SignalQuality,
  pub red_mean: f64,
  pub ir_mean: f64,
  /// RR intervals in milliseconds from peak detection.
  pub rr_intervals: Vec<f64>,
  pub pnn50: f64,
  pub sdsd: f64,
  pub hr_mad: f64,
  pub sd1: f64,
  pub sd2: f64,
  pub lf: f64,
  pub hf: f64,
  pub lf_hf: f64,
}

/// One accelerometer processing window: per-axis first-difference series,
/// movement magnitude statistics and an activity classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAcc {
  pub timestamp: f64,
  pub x_change: Vec<f64>,
  pub y_change: Vec<f64>,
  pub z_change: Vec<f64>,
  pub avg_movement: f64,
  pub std_movement: f64,
  pub max_movement: f64,
  pub activity_state: ActivityState,
  pub x_change_mean: f64,
  pub y_change_mean: f64,
  pub z_change_mean: f64,
}

/// One battery processing window: mean level and charge bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBattery {
  pub timestamp: f64,
  pub battery_level: f64,
  pub battery_status: BatteryStatus,
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_enum_wire_names() {
    assert_eq!(
      serde_json::to_string(&SignalQuality::Good).expect("Serializable"),
      "\"good\""
    );
    assert_eq!(
      serde_json::to_string(&ActivityState::Stationary).expect("Serializable"),
      "\"stationary\""
    );
    assert_eq!(
      serde_json::to_string(&BatteryStatus::Medium).expect("Serializable"),
      "\"medium\""
    );
  }

  #[test]
  fn test_band_powers_total() {
    let bands = BandPowers {
      delta: 1.0,
      theta: 2.0,
      alpha: 3.0,
      beta: 4.0,
      gamma: 5.0,
    };
    assert!((bands.total() - 15.0).abs() < f64::EPSILON);
  }
}
