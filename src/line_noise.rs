//! Mains removal by spectral-line subtraction.
//!
//! For every channel a least-squares fit of `cos(2π·k·f·t)` and
//! `sin(2π·k·f·t)` at each harmonic `k·f` below Nyquist is made over the
//! whole recording, and the fitted sinusoids are subtracted. Unlike the
//! notch FIR this leaves the neighbouring spectrum untouched.
use nalgebra::{DMatrix, DVector};

use crate::error::{PipelineError, Result};
use crate::signal::Signal;

/// Harmonics `f, 2f, …` strictly below Nyquist.
pub fn harmonics(line_freq: f64, sfreq: f64) -> Vec<f64> {
    let nyq = sfreq / 2.0;
    (1..)
        .map(|k| k as f64 * line_freq)
        .take_while(|&f| f < nyq)
        .collect()
}

/// Subtract the fitted line components from every channel.
pub fn remove_line_noise(signal: &Signal, line_freq: f64) -> Result<Signal> {
    if !(line_freq > 0.0) {
        return Err(PipelineError::InvalidParameter(format!("line frequency {line_freq}")));
    }
    let freqs = harmonics(line_freq, signal.sfreq);
    if freqs.is_empty() {
        log::warn!("line frequency {line_freq} Hz is above Nyquist, nothing removed");
        return Ok(signal.clone());
    }
    let basis = design_matrix(signal.n_times(), signal.sfreq, &freqs);
    let gram = basis.transpose() * &basis;
    let solver = gram
        .cholesky()
        .ok_or_else(|| PipelineError::Linalg("line-noise basis is rank deficient".into()))?;

    let mut out = signal.clone();
    for mut row in out.data.rows_mut() {
        let y = DVector::from_iterator(row.len(), row.iter().copied());
        let coef = solver.solve(&(basis.transpose() * &y));
        let fitted = &basis * coef;
        for (v, f) in row.iter_mut().zip(fitted.iter()) {
            *v -= f;
        }
    }
    log::debug!("subtracted line components at {freqs:?} Hz");
    Ok(out)
}

/// `[T, 2·H]` matrix of cosine/sine columns.
fn design_matrix(n_times: usize, sfreq: f64, freqs: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(n_times, 2 * freqs.len(), |t, j| {
        let phase = 2.0 * std::f64::consts::PI * freqs[j / 2] * t as f64 / sfreq;
        if j % 2 == 0 { phase.cos() } else { phase.sin() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::f64::consts::PI;

    #[test]
    fn harmonics_below_nyquist() {
        assert_eq!(harmonics(50.0, 250.0), vec![50.0, 100.0]);
        assert_eq!(harmonics(60.0, 250.0), vec![60.0, 120.0]);
        assert!(harmonics(50.0, 80.0).is_empty());
    }

    #[test]
    fn mains_and_harmonic_are_removed() {
        let sfreq = 250.0;
        let clean = |t: f64| 2.0 * (2.0 * PI * 10.0 * t).sin();
        let data = Array2::from_shape_fn((2, 2500), |(c, i)| {
            let t = i as f64 / sfreq;
            clean(t)
                + (c as f64 + 0.5) * (2.0 * PI * 50.0 * t + 0.3).sin()
                + 0.2 * (2.0 * PI * 100.0 * t).cos()
        });
        let sig = Signal::new(data, sfreq, vec!["A".into(), "B".into()]).unwrap();
        let out = remove_line_noise(&sig, 50.0).unwrap();
        for c in 0..2 {
            for i in 0..2500 {
                approx::assert_abs_diff_eq!(out.data[[c, i]], clean(i as f64 / sfreq), epsilon = 1e-8);
            }
        }
    }
}
