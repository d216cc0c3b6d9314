// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Morlet time-frequency power averaging.
//!
//! The EEG worker tiles one-second epochs across the quality-masked signal,
//! convolves each epoch with a complex Morlet family (1-45 Hz in 1 Hz steps,
//! `n_cycles = f / 2`), and averages |coefficient|^2 over time and epochs to
//! get one power value per frequency.

use num_complex::Complex64;

/// Complex Morlet wavelet for a center frequency, sampled at `fs`. The
/// temporal extent is +/- 3.5 standard deviations of the Gaussian envelope,
/// L2-normalized.
pub fn morlet_wavelet(freq: f64, n_cycles: f64, fs: f64) -> Vec<Complex64> {
  let sigma_t = n_cycles / (2.0 * std::f64::consts::PI * freq);
  let half = ((3.5 * sigma_t * fs).ceil() as isize).max(1);
  let mut taps = Vec::with_capacity((2 * half + 1) as usize);
  for k in -half..=half {
    let t = k as f64 / fs;
    let envelope = (-t * t / (2.0 * sigma_t * sigma_t)).exp();
    let phase = 2.0 * std::f64::consts::PI * freq * t;
    taps.push(Complex64::new(phase.cos(), phase.sin()) * envelope);
  }
  let norm: f64 = taps.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
  taps.iter().map(|c| c / norm).collect()
}

/// Mean wavelet power of `signal` at `freq`, averaged across the epoch.
/// Same-length convolution with zero padding at the epoch edges.
fn epoch_power(signal: &[f64], wavelet: &[Complex64]) -> f64 {
  if signal.is_empty() {
    return 0.0;
  }
  let half = wavelet.len() / 2;
  let mut total = 0.0;
  for center in 0..signal.len() {
    let mut acc = Complex64::new(0.0, 0.0);
    for (j, tap) in wavelet.iter().enumerate() {
      let idx = center as isize + j as isize - half as isize;
      if idx >= 0 && (idx as usize) < signal.len() {
        acc += tap * signal[idx as usize];
      }
    }
    total += acc.norm_sqr();
  }
  total / signal.len() as f64
}

/// Time-averaged Morlet power per frequency over one-second epochs tiled
/// across `signal`. Frequencies are `1..=max_freq` Hz in 1 Hz steps with
/// `n_cycles = f / 2`. Returns `(frequencies, power)`; power is linear (the
/// caller converts to dB).
pub fn tfr_morlet_mean_power(signal: &[f64], fs: f64, max_freq: usize) -> (Vec<f64>, Vec<f64>) {
  let epoch_len = fs as usize;
  let n_epochs = signal.len() / epoch_len;
  let freqs: Vec<f64> = (1..=max_freq).map(|f| f as f64).collect();
  if n_epochs == 0 {
    return (freqs, vec![0.0; max_freq]);
  }
  let mut power = Vec::with_capacity(max_freq);
  for &freq in &freqs {
    let wavelet = morlet_wavelet(freq, freq / 2.0, fs);
    let mut acc = 0.0;
    for e in 0..n_epochs {
      let epoch = &signal[e * epoch_len..(e + 1) * epoch_len];
      acc += epoch_power(epoch, &wavelet);
    }
    power.push(acc / n_epochs as f64);
  }
  (freqs, power)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_wavelet_is_normalized() {
    let wavelet = morlet_wavelet(10.0, 5.0, 250.0);
    let energy: f64 = wavelet.iter().map(|c| c.norm_sqr()).sum();
    assert!((energy - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_power_peaks_at_signal_frequency() {
    let fs = 250.0;
    let signal: Vec<f64> = (0..1000)
      .map(|i| (2.0 * std::f64::consts::PI * 12.0 * i as f64 / fs).sin())
      .collect();
    let (freqs, power) = tfr_morlet_mean_power(&signal, fs, 45);
    let peak = power
      .iter()
      .enumerate()
      .max_by(|a, b| a.1.partial_cmp(b.1).expect("No NaN"))
      .expect("Nonempty")
      .0;
    assert!((freqs[peak] - 12.0).abs() <= 1.0);
  }

  #[test]
  fn test_short_signal_yields_zero_power() {
    let (freqs, power) = tfr_morlet_mean_power(&[0.5; 100], 250.0, 45);
    assert_eq!(freqs.len(), 45);
    assert!(power.iter().all(|p| *p == 0.0));
  }
}
