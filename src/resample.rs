//! FFT resampling as in MNE's `resample(..., method='fft')`.
//!
//! Each row is reflect-padded to a power-of-two friendly length, taken to
//! the half-spectrum, rescaled to the new length and brought back with a
//! real inverse transform. The padding is then cut from both ends.
//! Annotations are stored in seconds and survive resampling untouched.
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{PipelineError, Result};
use crate::filter::apply::reflect_limited_pad;
use crate::signal::Signal;

/// Compute the auto npad as MNE does: pad to the next power of 2.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// npads   = [total // 2, total - total // 2]
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Output length for `n` input samples: `round(n · dst / src)`.
pub fn final_length(n: usize, src_sfreq: f64, dst_sfreq: f64) -> usize {
    (n as f64 * dst_sfreq / src_sfreq).round() as usize
}

/// Resample a signal to `dst_sfreq`. A no-op copy when the rates agree.
pub fn resample(signal: &Signal, dst_sfreq: f64) -> Result<Signal> {
    if !(dst_sfreq > 0.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "target sampling rate must be > 0, got {dst_sfreq}"
        )));
    }
    if (signal.sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(signal.clone());
    }
    let data = resample_array(&signal.data, signal.sfreq, dst_sfreq);
    log::debug!(
        "resampled {} → {} Hz ({} → {} samples)",
        signal.sfreq,
        dst_sfreq,
        signal.n_times(),
        data.ncols()
    );
    let mut out = signal.clone();
    out.data = data;
    out.sfreq = dst_sfreq;
    Ok(out)
}

/// Resample every row of `data` ([C, T]) from `src_sfreq` to `dst_sfreq`.
pub fn resample_array(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Array2<f64> {
    let ratio = dst_sfreq / src_sfreq;
    let n_in = data.ncols();
    let n_out = final_length(n_in, src_sfreq, dst_sfreq);

    let (npad_l, npad_r) = auto_npad(n_in);
    let mut out = Array2::<f64>::zeros((data.nrows(), n_out));
    for (row_in, mut row_out) in data.rows().into_iter().zip(out.rows_mut()) {
        let x = row_in.to_vec();
        let y = resample_1d(&x, ratio, npad_l, npad_r);
        row_out.assign(&ndarray::ArrayView1::from(&y));
    }
    out
}

/// Resample a single 1-D signal with explicit (possibly asymmetric) padding.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Vec<f64> {
    let n_in = x.len();
    if n_in == 0 {
        return vec![];
    }
    let final_len = (ratio * n_in as f64).round() as usize;

    let padded = reflect_limited_pad(x, npad_l.min(n_in - 1), npad_r.min(n_in - 1));
    let old_len = padded.len();
    let new_len = (ratio * old_len as f64).round() as usize;

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum = half_spectrum(&mut planner, &padded);
    fix_nyquist(&mut spectrum, old_len, new_len);
    let gain = new_len as f64 / old_len as f64;
    spectrum.iter_mut().for_each(|v| *v *= gain);
    let y = inverse_half_spectrum(&mut planner, &spectrum, new_len);

    let skip = ((ratio * npad_l as f64).round() as usize).min(y.len());
    let mut out: Vec<f64> = y.into_iter().skip(skip).take(final_len).collect();
    out.resize(final_len, 0.0);
    out
}

/// First `n / 2 + 1` bins of the forward transform of a real signal.
fn half_spectrum(planner: &mut FftPlanner<f64>, x: &[f64]) -> Vec<Complex<f64>> {
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&re| Complex::new(re, 0.0)).collect();
    planner.plan_fft_forward(buf.len()).process(&mut buf);
    buf.truncate(x.len() / 2 + 1);
    buf
}

/// Downsampling doubles the Nyquist bin of the output length, upsampling
/// halves the one of the input length. Odd lengths have no Nyquist bin.
fn fix_nyquist(spectrum: &mut [Complex<f64>], old_len: usize, new_len: usize) {
    let (len, factor) = if new_len < old_len { (new_len, 2.0) } else { (old_len, 0.5) };
    if len % 2 == 0 {
        if let Some(bin) = spectrum.get_mut(len / 2) {
            *bin *= factor;
        }
    }
}

/// Real inverse transform of length `n`; bins past `n / 2` are dropped and
/// missing ones are zero.
fn inverse_half_spectrum(planner: &mut FftPlanner<f64>, half: &[Complex<f64>], n: usize) -> Vec<f64> {
    if n == 0 {
        return vec![];
    }
    let keep = half.len().min(n / 2 + 1);
    let mut buf = vec![Complex::<f64>::default(); n];
    buf[..keep].copy_from_slice(&half[..keep]);
    for k in 1..keep {
        if n - k > n / 2 {
            buf[n - k] = buf[k].conj();
        }
    }
    planner.plan_fft_inverse(n).process(&mut buf);
    buf.iter().map(|c| c.re / n as f64).collect()
}
