// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Accelerometer window processing: per-axis gradients, movement magnitude
//! statistics and a coarse activity classification.

use crate::{mean, std_dev};
use lxband_core::{
  SensorType,
  errors::DspError,
  message::{AccSample, ActivityState, ProcessedAcc},
};

/// About one second of signal.
pub const MIN_SAMPLES: usize = 30;

const STATIONARY_BELOW: f64 = 200.0;
const SITTING_BELOW: f64 = 600.0;
const WALKING_BELOW: f64 = 1000.0;

#[derive(Default)]
pub struct AccProcessor {}

impl AccProcessor {
  pub fn process(
    &self,
    samples: &[AccSample],
    timestamp: f64,
  ) -> Result<ProcessedAcc, DspError> {
    if samples.len() < MIN_SAMPLES {
      return Err(DspError::InsufficientData {
        sensor: SensorType::Acc,
        have: samples.len(),
        need: MIN_SAMPLES,
      });
    }
    let x: Vec<f64> = samples.iter().map(|s| s.x as f64).collect();
    let y: Vec<f64> = samples.iter().map(|s| s.y as f64).collect();
    let z: Vec<f64> = samples.iter().map(|s| s.z as f64).collect();

    let x_change = gradient(&x);
    let y_change = gradient(&y);
    let z_change = gradient(&z);
    let magnitude: Vec<f64> = x_change
      .iter()
      .zip(&y_change)
      .zip(&z_change)
      .map(|((dx, dy), dz)| (dx * dx + dy * dy + dz * dz).sqrt())
      .collect();

    let avg_movement = mean(&magnitude);
    let std_movement = std_dev(&magnitude);
    let max_movement = magnitude.iter().copied().fold(0.0, f64::max);
    let activity_state = classify(avg_movement);

    Ok(ProcessedAcc {
      timestamp,
      x_change_mean: mean(&x_change),
      y_change_mean: mean(&y_change),
      z_change_mean: mean(&z_change),
      x_change,
      y_change,
      z_change,
      avg_movement,
      std_movement,
      max_movement,
      activity_state,
    })
  }
}

fn classify(avg_movement: f64) -> ActivityState {
  if avg_movement < STATIONARY_BELOW {
    ActivityState::Stationary
  } else if avg_movement < SITTING_BELOW {
    ActivityState::Sitting
  } else if avg_movement < WALKING_BELOW {
    ActivityState::Walking
  } else {
    ActivityState::Running
  }
}

/// Central differences with one-sided differences at the edges, output the
/// same length as the input.
fn gradient(data: &[f64]) -> Vec<f64> {
  let n = data.len();
  if n < 2 {
    return vec![0.0; n];
  }
  let mut grad = Vec::with_capacity(n);
  grad.push(data[1] - data[0]);
  for i in 1..n - 1 {
    grad.push((data[i + 1] - data[i - 1]) / 2.0);
  }
  grad.push(data[n - 1] - data[n - 2]);
  grad
}

#[cfg(test)]
mod test {
  use super::*;

  fn window(values: impl Fn(usize) -> (i16, i16, i16), n: usize) -> Vec<AccSample> {
    (0..n)
      .map(|i| {
        let (x, y, z) = values(i);
        AccSample {
          timestamp: i as f64 / 30.0,
          x,
          y,
          z,
        }
      })
      .collect()
  }

  #[test]
  fn test_insufficient_data_is_an_error() {
    let processor = AccProcessor::default();
    assert!(matches!(
      processor.process(&window(|_| (0, 0, 0), 10), 0.0),
      Err(DspError::InsufficientData { need: 30, .. })
    ));
  }

  #[test]
  fn test_still_device_is_stationary() {
    let processor = AccProcessor::default();
    let frame = processor
      .process(&window(|_| (100, -50, 4000), 60), 1.0)
      .expect("Processable window");
    assert_eq!(frame.activity_state, ActivityState::Stationary);
    assert!(frame.avg_movement < 1.0);
    assert_eq!(frame.x_change.len(), 60);
  }

  #[test]
  fn test_large_swings_classify_as_running() {
    let processor = AccProcessor::default();
    let frame = processor
      .process(
        &window(|i| if i % 2 == 0 { (8000, 8000, 8000) } else { (-8000, -8000, -8000) }, 60),
        1.0,
      )
      .expect("Processable window");
    assert_eq!(frame.activity_state, ActivityState::Running);
    assert!(frame.max_movement > 1000.0);
  }

  #[test]
  fn test_gradient_matches_central_difference() {
    assert_eq!(gradient(&[0.0, 1.0, 4.0]), vec![1.0, 2.0, 3.0]);
  }
}
