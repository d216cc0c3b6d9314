// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Signal processing for the Link Band sensors.
//!
//! Everything in this crate is synchronous and allocation-happy on purpose:
//! the server's pipeline workers run these functions on the blocking pool at
//! a fixed cadence (0.5 s for EEG/PPG/ACC, 1 s for battery), so per-window
//! allocations are irrelevant next to the filtering and FFT work. No function
//! here touches a buffer, a socket or a clock; windows come in as slices and
//! processed frames come out as values.

#[macro_use]
extern crate tracing;

pub mod acc;
pub mod battery;
pub mod eeg;
pub mod filter;
pub mod ppg;
pub mod quality;
pub mod spectral;
pub mod wavelet;

pub use acc::AccProcessor;
pub use battery::BatteryProcessor;
pub use eeg::EegProcessor;
pub use ppg::PpgProcessor;

/// Canonical EEG bands in Hz, half-open `[low, high)`.
pub const EEG_BANDS: [(&str, f64, f64); 5] = [
  ("delta", 1.0, 4.0),
  ("theta", 4.0, 8.0),
  ("alpha", 8.0, 13.0),
  ("beta", 13.0, 30.0),
  ("gamma", 30.0, 45.0),
];

/// Keep every `factor`-th element, starting at index 0. A factor of zero or
/// one returns the input unchanged.
pub fn downsample(data: &[f64], factor: usize) -> Vec<f64> {
  if factor <= 1 {
    return data.to_vec();
  }
  data.iter().step_by(factor).copied().collect()
}

/// Down-sampling factor that reduces `len` to roughly `target` points.
pub fn downsample_factor(len: usize, target: usize) -> usize {
  if target == 0 {
    return 1;
  }
  (len / target).max(1)
}

pub(crate) fn mean(data: &[f64]) -> f64 {
  if data.is_empty() {
    return 0.0;
  }
  data.iter().sum::<f64>() / data.len() as f64
}

pub(crate) fn std_dev(data: &[f64]) -> f64 {
  if data.is_empty() {
    return 0.0;
  }
  let m = mean(data);
  (data.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / data.len() as f64).sqrt()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_downsample_step() {
    let data: Vec<f64> = (0..10).map(|i| i as f64).collect();
    assert_eq!(downsample(&data, 3), vec![0.0, 3.0, 6.0, 9.0]);
    assert_eq!(downsample(&data, 1).len(), 10);
  }

  #[test]
  fn test_downsample_factor_targets() {
    assert_eq!(downsample_factor(2000, 250), 8);
    assert_eq!(downsample_factor(100, 250), 1);
  }
}
