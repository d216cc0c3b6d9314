// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Power spectral density estimation (Welch's method) and small integration
//! helpers shared by the EEG frequency-SQI stage and the PPG LF/HF stage.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Welch PSD with a periodic Hann window, 50% overlap, per-segment mean
/// detrend and one-sided density scaling. Returns `(freqs, psd)` with
/// `nperseg / 2 + 1` bins. `nperseg` is clamped to the signal length.
pub fn welch(x: &[f64], fs: f64, nperseg: usize) -> (Vec<f64>, Vec<f64>) {
  let nperseg = nperseg.min(x.len()).max(2);
  let step = (nperseg / 2).max(1);
  let window = hann(nperseg);
  let window_power: f64 = window.iter().map(|w| w * w).sum();
  let scale = 1.0 / (fs * window_power);

  let mut planner = FftPlanner::new();
  let fft = planner.plan_fft_forward(nperseg);

  let n_bins = nperseg / 2 + 1;
  let mut psd = vec![0.0; n_bins];
  let mut segments = 0usize;
  let mut start = 0usize;
  while start + nperseg <= x.len() {
    let segment = &x[start..start + nperseg];
    let seg_mean = segment.iter().sum::<f64>() / nperseg as f64;
    let mut buffer: Vec<Complex64> = segment
      .iter()
      .zip(&window)
      .map(|(v, w)| Complex64::new((v - seg_mean) * w, 0.0))
      .collect();
    fft.process(&mut buffer);
    for (k, value) in buffer.iter().take(n_bins).enumerate() {
      let mut power = value.norm_sqr() * scale;
      // One-sided spectrum: fold the negative frequencies into every bin
      // except DC and Nyquist.
      if k != 0 && !(nperseg % 2 == 0 && k == n_bins - 1) {
        power *= 2.0;
      }
      psd[k] += power;
    }
    segments += 1;
    start += step;
  }
  if segments > 0 {
    for value in &mut psd {
      *value /= segments as f64;
    }
  }
  let freqs = (0..n_bins).map(|k| k as f64 * fs / nperseg as f64).collect();
  (freqs, psd)
}

fn hann(n: usize) -> Vec<f64> {
  (0..n)
    .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
    .collect()
}

/// Trapezoidal integration of `y` over `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
  if y.len() < 2 || y.len() != x.len() {
    return 0.0;
  }
  y.windows(2)
    .zip(x.windows(2))
    .map(|(ys, xs)| 0.5 * (ys[0] + ys[1]) * (xs[1] - xs[0]))
    .sum()
}

/// Summed PSD power over `[low, high]` inclusive, and total power, as used by
/// the frequency SQI ratio.
pub fn band_power_ratio(freqs: &[f64], psd: &[f64], low: f64, high: f64) -> f64 {
  let total: f64 = psd.iter().sum();
  if total <= 0.0 {
    return 0.0;
  }
  let band: f64 = freqs
    .iter()
    .zip(psd)
    .filter(|(f, _)| **f >= low && **f <= high)
    .map(|(_, p)| *p)
    .sum();
  band / total
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_welch_peak_at_tone_frequency() {
    let fs = 250.0;
    let x: Vec<f64> = (0..2000)
      .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
      .collect();
    let (freqs, psd) = welch(&x, fs, 256);
    let peak = psd
      .iter()
      .enumerate()
      .max_by(|a, b| a.1.partial_cmp(b.1).expect("No NaN"))
      .expect("Nonempty")
      .0;
    assert!((freqs[peak] - 10.0).abs() < 1.5);
  }

  #[test]
  fn test_welch_bin_count() {
    let x = vec![0.0; 64];
    let (freqs, psd) = welch(&x, 250.0, 32);
    assert_eq!(freqs.len(), 17);
    assert_eq!(psd.len(), 17);
  }

  #[test]
  fn test_trapezoid_linear() {
    let x = vec![0.0, 1.0, 2.0];
    let y = vec![0.0, 1.0, 2.0];
    assert!((trapezoid(&y, &x) - 2.0).abs() < 1e-12);
  }

  #[test]
  fn test_band_power_ratio_bounds() {
    let freqs = vec![0.0, 1.0, 2.0, 3.0];
    let psd = vec![1.0, 1.0, 1.0, 1.0];
    let ratio = band_power_ratio(&freqs, &psd, 1.0, 2.0);
    assert!((ratio - 0.5).abs() < 1e-12);
    assert_eq!(band_power_ratio(&freqs, &[0.0; 4], 1.0, 2.0), 0.0);
  }
}
