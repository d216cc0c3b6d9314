// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Battery window processing: mean level and charge bucket.

use crate::mean;
use lxband_core::{
  SensorType,
  errors::DspError,
  message::{BatterySample, BatteryStatus, ProcessedBattery},
};

/// The battery worker requires a full analysis buffer before reporting.
pub const MIN_SAMPLES: usize = 50;

const HIGH_AT: f64 = 80.0;
const MEDIUM_AT: f64 = 20.0;

#[derive(Default)]
pub struct BatteryProcessor {}

impl BatteryProcessor {
  pub fn process(
    &self,
    samples: &[BatterySample],
    timestamp: f64,
  ) -> Result<ProcessedBattery, DspError> {
    if samples.len() < MIN_SAMPLES {
      return Err(DspError::InsufficientData {
        sensor: SensorType::Bat,
        have: samples.len(),
        need: MIN_SAMPLES,
      });
    }
    let levels: Vec<f64> = samples.iter().map(|s| s.level as f64).collect();
    let battery_level = mean(&levels);
    let battery_status = if battery_level >= HIGH_AT {
      BatteryStatus::High
    } else if battery_level >= MEDIUM_AT {
      BatteryStatus::Medium
    } else {
      BatteryStatus::Low
    };
    Ok(ProcessedBattery {
      timestamp,
      battery_level,
      battery_status,
    })
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn window(level: u8, n: usize) -> Vec<BatterySample> {
    (0..n)
      .map(|i| BatterySample {
        timestamp: i as f64,
        level,
      })
      .collect()
  }

  #[test]
  fn test_requires_full_buffer() {
    let processor = BatteryProcessor::default();
    assert!(matches!(
      processor.process(&window(90, 10), 0.0),
      Err(DspError::InsufficientData { need: 50, .. })
    ));
  }

  #[test]
  fn test_bucket_boundaries() {
    let processor = BatteryProcessor::default();
    let high = processor.process(&window(80, 50), 0.0).expect("Full buffer");
    assert_eq!(high.battery_status, BatteryStatus::High);
    let medium = processor.process(&window(20, 50), 0.0).expect("Full buffer");
    assert_eq!(medium.battery_status, BatteryStatus::Medium);
    let low = processor.process(&window(19, 50), 0.0).expect("Full buffer");
    assert_eq!(low.battery_status, BatteryStatus::Low);
    assert!((low.battery_level - 19.0).abs() < f64::EPSILON);
  }
}
