// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Raw sensor samples as decoded from notification packets.
//!
//! Timestamps are seconds as `f64`. For EEG/PPG/ACC the base comes from the
//! device's 32768 Hz tick counter; per-sample offsets are `i / sample_rate`.
//! Battery samples are stamped with wall-clock arrival time since the device
//! only notifies on level changes.

use serde::{Deserialize, Serialize};

/// One EEG sample: two channels in microvolts plus per-channel electrode
/// lead-off flags from the analog front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegSample {
  pub timestamp: f64,
  /// Channel 1 voltage in microvolts.
  pub ch1: f64,
  /// Channel 2 voltage in microvolts.
  pub ch2: f64,
  pub leadoff_ch1: bool,
  pub leadoff_ch2: bool,
}

/// One PPG sample: raw 24-bit photodiode counts for the red and infrared
/// emitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpgSample {
  pub timestamp: f64,
  pub red: u32,
  pub ir: u32,
}

/// One accelerometer sample, raw signed 16-bit counts per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccSample {
  pub timestamp: f64,
  pub x: i16,
  pub y: i16,
  pub z: i16,
}

/// One battery level reading, percent of full charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySample {
  pub timestamp: f64,
  pub level: u8,
}
