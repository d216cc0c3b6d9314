// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! IIR and FIR filtering primitives.
//!
//! The Butterworth design follows the classic zpk path: analog lowpass
//! prototype, lowpass-to-bandpass transform, bilinear transform, then
//! zpk-to-transfer-function expansion. `filtfilt` runs the filter forward and
//! backward over an odd-reflected extension of the signal with steady-state
//! initial conditions, which is what makes the EEG and PPG filtering
//! zero-phase.

use lxband_core::errors::DspError;
use num_complex::Complex64;

/// IIR transfer function coefficients, `b` numerator / `a` denominator,
/// normalized so `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct IirCoeffs {
  pub b: Vec<f64>,
  pub a: Vec<f64>,
}

/// Butterworth bandpass design. `order` is the prototype order; the
/// resulting bandpass filter has `2 * order` poles. Frequencies in Hz.
pub fn butter_bandpass(
  order: usize,
  low_hz: f64,
  high_hz: f64,
  fs: f64,
) -> Result<IirCoeffs, DspError> {
  let nyquist = fs / 2.0;
  if !(0.0 < low_hz && low_hz < high_hz && high_hz < nyquist) {
    return Err(DspError::FilterFailure(format!(
      "bandpass edges {low_hz}-{high_hz} Hz invalid for fs {fs} Hz"
    )));
  }
  // Normalize to the bilinear transform's internal rate of 2 Hz and pre-warp
  // the band edges.
  let fs2 = 2.0;
  let warped_low = 2.0 * fs2 * (std::f64::consts::PI * (low_hz / nyquist) / fs2).tan();
  let warped_high = 2.0 * fs2 * (std::f64::consts::PI * (high_hz / nyquist) / fs2).tan();
  let bw = warped_high - warped_low;
  let w0 = (warped_low * warped_high).sqrt();

  // Analog lowpass prototype: poles evenly spaced on the left unit
  // semicircle, no finite zeros, unit gain.
  let mut poles = Vec::with_capacity(order);
  for k in 1..=order {
    let theta = std::f64::consts::PI * (2.0 * k as f64 + order as f64 - 1.0) / (2.0 * order as f64);
    poles.push(Complex64::new(theta.cos(), theta.sin()));
  }

  // Lowpass to bandpass: each pole splits in two, zeros appear at s = 0.
  let mut bp_poles = Vec::with_capacity(order * 2);
  for p in &poles {
    let scaled = p * (bw / 2.0);
    let disc = (scaled * scaled - Complex64::new(w0 * w0, 0.0)).sqrt();
    bp_poles.push(scaled + disc);
    bp_poles.push(scaled - disc);
  }
  let bp_zeros = vec![Complex64::new(0.0, 0.0); order];
  let bp_gain = bw.powi(order as i32);

  // Bilinear transform to the digital domain.
  let fs4 = Complex64::new(2.0 * fs2, 0.0);
  let z_poles: Vec<Complex64> = bp_poles.iter().map(|p| (fs4 + p) / (fs4 - p)).collect();
  let mut z_zeros: Vec<Complex64> = bp_zeros.iter().map(|z| (fs4 + z) / (fs4 - z)).collect();
  let num: Complex64 = bp_zeros.iter().fold(Complex64::new(1.0, 0.0), |acc, z| acc * (fs4 - z));
  let den: Complex64 = bp_poles.iter().fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs4 - p));
  let z_gain = bp_gain * (num / den).re;
  // Degree deficit maps to zeros at z = -1.
  while z_zeros.len() < z_poles.len() {
    z_zeros.push(Complex64::new(-1.0, 0.0));
  }

  let mut b = poly_from_roots(&z_zeros);
  let a = poly_from_roots(&z_poles);
  for coeff in &mut b {
    *coeff *= z_gain;
  }
  Ok(IirCoeffs { b, a })
}

/// Expand a monic polynomial from its complex roots, returning real
/// coefficients (imaginary residue from conjugate pairs is discarded).
fn poly_from_roots(roots: &[Complex64]) -> Vec<f64> {
  let mut coeffs = vec![Complex64::new(1.0, 0.0)];
  for root in roots {
    let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
    for (i, c) in coeffs.iter().enumerate() {
      next[i] += c;
      next[i + 1] -= c * root;
    }
    coeffs = next;
  }
  coeffs.iter().map(|c| c.re).collect()
}

/// Direct-form II transposed filter with explicit initial state. Returns the
/// output and the final state.
fn lfilter_with_state(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> (Vec<f64>, Vec<f64>) {
  let n = a.len().max(b.len());
  let mut bn = b.to_vec();
  let mut an = a.to_vec();
  bn.resize(n, 0.0);
  an.resize(n, 0.0);
  let mut state = zi.to_vec();
  state.resize(n - 1, 0.0);
  let mut y = Vec::with_capacity(x.len());
  for &sample in x {
    let out = bn[0] * sample + state.first().copied().unwrap_or(0.0);
    for i in 0..state.len() {
      let carry = if i + 1 < state.len() { state[i + 1] } else { 0.0 };
      state[i] = bn[i + 1] * sample + carry - an[i + 1] * out;
    }
    y.push(out);
  }
  (y, state)
}

/// Causal filter run with zero initial state.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
  lfilter_with_state(b, a, x, &[]).0
}

/// Steady-state initial conditions for a unit step, so `filtfilt` does not
/// ring at the edges. Solves `(I - A^T) zi = B` over the companion form.
fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
  let n = a.len().max(b.len());
  if n < 2 {
    return vec![];
  }
  let mut bn = b.to_vec();
  let mut an = a.to_vec();
  bn.resize(n, 0.0);
  an.resize(n, 0.0);
  let dim = n - 1;
  // Build (I - A^T) where A is the companion matrix of `an`.
  let mut m = vec![vec![0.0; dim]; dim];
  for i in 0..dim {
    m[i][0] = an[i + 1];
    if i + 1 < dim {
      m[i][i + 1] = -1.0;
    }
    m[i][i] += 1.0;
  }
  let rhs: Vec<f64> = (0..dim).map(|i| bn[i + 1] - an[i + 1] * bn[0]).collect();
  solve_linear(m, rhs)
}

/// Gaussian elimination with partial pivoting. Systems here are tiny (the
/// filter order), so numerical sophistication beyond pivoting is unneeded.
fn solve_linear(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Vec<f64> {
  let dim = rhs.len();
  for col in 0..dim {
    let pivot = (col..dim)
      .max_by(|&i, &j| m[i][col].abs().partial_cmp(&m[j][col].abs()).expect("No NaN pivots"))
      .expect("Non-empty column");
    m.swap(col, pivot);
    rhs.swap(col, pivot);
    let diag = m[col][col];
    if diag.abs() < f64::EPSILON {
      continue;
    }
    for row in (col + 1)..dim {
      let factor = m[row][col] / diag;
      for k in col..dim {
        m[row][k] -= factor * m[col][k];
      }
      rhs[row] -= factor * rhs[col];
    }
  }
  let mut solution = vec![0.0; dim];
  for row in (0..dim).rev() {
    let mut acc = rhs[row];
    for k in (row + 1)..dim {
      acc -= m[row][k] * solution[k];
    }
    if m[row][row].abs() > f64::EPSILON {
      solution[row] = acc / m[row][row];
    }
  }
  solution
}

/// Zero-phase forward-backward IIR filtering over an odd-reflected signal
/// extension, matching the behavior the EEG bandpass stage depends on.
pub fn filtfilt(coeffs: &IirCoeffs, x: &[f64]) -> Result<Vec<f64>, DspError> {
  let pad = 3 * (coeffs.a.len().max(coeffs.b.len()) - 1);
  if x.len() <= pad {
    return Err(DspError::FilterFailure(format!(
      "signal of {} samples too short for filtfilt pad of {}",
      x.len(),
      pad
    )));
  }
  let extended = odd_extend(x, pad);
  let zi = lfilter_zi(&coeffs.b, &coeffs.a);

  let zi_fwd: Vec<f64> = zi.iter().map(|z| z * extended[0]).collect();
  let (forward, _) = lfilter_with_state(&coeffs.b, &coeffs.a, &extended, &zi_fwd);

  let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
  let zi_bwd: Vec<f64> = zi.iter().map(|z| z * reversed[0]).collect();
  let (backward, _) = lfilter_with_state(&coeffs.b, &coeffs.a, &reversed, &zi_bwd);
  reversed = backward.into_iter().rev().collect();

  Ok(reversed[pad..pad + x.len()].to_vec())
}

/// Odd reflection about the end samples: `2*x[0] - x[pad..1]` on the left,
/// mirrored on the right.
fn odd_extend(x: &[f64], pad: usize) -> Vec<f64> {
  let mut extended = Vec::with_capacity(x.len() + 2 * pad);
  for i in (1..=pad).rev() {
    extended.push(2.0 * x[0] - x[i]);
  }
  extended.extend_from_slice(x);
  let last = x[x.len() - 1];
  for i in 2..=(pad + 1) {
    extended.push(2.0 * last - x[x.len() - i]);
  }
  extended
}

/// Windowed-sinc FIR band-stop (notch) design, Hamming window, odd tap count
/// for exact linear phase. The stop band is `notch_hz ± half_width_hz`.
pub fn fir_notch(notch_hz: f64, half_width_hz: f64, fs: f64, numtaps: usize) -> Vec<f64> {
  let numtaps = if numtaps % 2 == 0 { numtaps + 1 } else { numtaps };
  let mid = (numtaps / 2) as isize;
  let f_low = (notch_hz - half_width_hz) / fs;
  let f_high = (notch_hz + half_width_hz) / fs;
  let mut taps = Vec::with_capacity(numtaps);
  for n in 0..numtaps {
    let k = n as isize - mid;
    // Band-stop = all-pass minus bandpass of the stop band.
    let bandpass = 2.0 * f_high * sinc(2.0 * f_high * k as f64)
      - 2.0 * f_low * sinc(2.0 * f_low * k as f64);
    let allpass = if k == 0 { 1.0 } else { 0.0 };
    let window = 0.54
      - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / (numtaps as f64 - 1.0)).cos();
    // Window only shapes the bandpass part; the center all-pass tap stays 1.
    taps.push(allpass - bandpass * window);
  }
  // Normalize DC gain to exactly one.
  let dc: f64 = taps.iter().sum();
  taps.iter().map(|t| t / dc).collect()
}

fn sinc(x: f64) -> f64 {
  if x == 0.0 {
    1.0
  } else {
    let px = std::f64::consts::PI * x;
    px.sin() / px
  }
}

/// Apply a linear-phase FIR with group-delay compensation, yielding a
/// zero-phase result of the input's length. Edges use odd reflection.
pub fn filter_zero_phase_fir(taps: &[f64], x: &[f64]) -> Result<Vec<f64>, DspError> {
  let delay = taps.len() / 2;
  if x.len() <= delay {
    return Err(DspError::FilterFailure(format!(
      "signal of {} samples too short for {}-tap FIR",
      x.len(),
      taps.len()
    )));
  }
  let extended = odd_extend(x, delay);
  let mut y = Vec::with_capacity(x.len());
  for i in 0..x.len() {
    let mut acc = 0.0;
    for (j, tap) in taps.iter().enumerate() {
      acc += tap * extended[i + j];
    }
    y.push(acc);
  }
  Ok(y)
}

#[cfg(test)]
mod test {
  use super::*;

  fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
    (0..n)
      .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin())
      .collect()
  }

  fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
  }

  #[test]
  fn test_butter_bandpass_passes_band_rejects_stops() {
    let coeffs = butter_bandpass(4, 1.0, 45.0, 250.0).expect("Valid design");
    let inband = filtfilt(&coeffs, &tone(10.0, 250.0, 2000)).expect("Filterable");
    let stopband = filtfilt(&coeffs, &tone(80.0, 250.0, 2000)).expect("Filterable");
    // Interior samples only, away from edge transients.
    assert!(rms(&inband[500..1500]) > 0.6);
    assert!(rms(&stopband[500..1500]) < 0.05);
  }

  #[test]
  fn test_butter_coeff_lengths() {
    let coeffs = butter_bandpass(4, 1.0, 45.0, 250.0).expect("Valid design");
    assert_eq!(coeffs.a.len(), 9);
    assert_eq!(coeffs.b.len(), 9);
    assert!((coeffs.a[0] - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_butter_rejects_bad_edges() {
    assert!(butter_bandpass(4, 45.0, 1.0, 250.0).is_err());
    assert!(butter_bandpass(2, 0.5, 130.0, 250.0).is_err());
  }

  #[test]
  fn test_filtfilt_preserves_dc_in_lowpassish_band() {
    // A 10 Hz tone should come through with no phase shift: peak positions
    // of input and output line up.
    let coeffs = butter_bandpass(4, 1.0, 45.0, 250.0).expect("Valid design");
    let x = tone(10.0, 250.0, 2000);
    let y = filtfilt(&coeffs, &x).expect("Filterable");
    let x_peak = (900..1100).max_by(|&i, &j| x[i].partial_cmp(&x[j]).expect("No NaN")).expect("Nonempty");
    let y_peak = (900..1100).max_by(|&i, &j| y[i].partial_cmp(&y[j]).expect("No NaN")).expect("Nonempty");
    assert!((x_peak as i64 - y_peak as i64).abs() <= 1);
  }

  #[test]
  fn test_fir_notch_attenuates_notch_frequency() {
    let taps = fir_notch(60.0, 2.0, 250.0, 251);
    let hum = filter_zero_phase_fir(&taps, &tone(60.0, 250.0, 2000)).expect("Filterable");
    let keep = filter_zero_phase_fir(&taps, &tone(10.0, 250.0, 2000)).expect("Filterable");
    assert!(rms(&hum[500..1500]) < 0.05);
    assert!(rms(&keep[500..1500]) > 0.6);
  }

  #[test]
  fn test_short_signal_errors() {
    let coeffs = butter_bandpass(4, 1.0, 45.0, 250.0).expect("Valid design");
    assert!(matches!(
      filtfilt(&coeffs, &[1.0, 2.0, 3.0]),
      Err(DspError::FilterFailure(_))
    ));
  }
}
