//! Baseline correction of trial tensors.
//!
//! Matches `epochs.apply_baseline((bmin, bmax))`: for every trial and
//! channel, subtract the mean over the samples whose times fall inside the
//! baseline interval. A `None` bound stands for the window edge.
use ndarray::{s, Array3};

/// Inclusive sample range `[i0, i1]` of `times` covered by `(bmin, bmax)`.
///
/// Returns `None` when the interval selects no samples.
pub fn baseline_range(times: &[f64], sfreq: f64, bmin: Option<f64>, bmax: Option<f64>) -> Option<(usize, usize)> {
    // Half a sample of slack absorbs rounding in `times`.
    let tol = 0.5 / sfreq;
    let lo = bmin.unwrap_or(f64::NEG_INFINITY) - tol;
    let hi = bmax.unwrap_or(f64::INFINITY) + tol;
    let i0 = times.iter().position(|&t| t >= lo)?;
    let i1 = times.iter().rposition(|&t| t <= hi)?;
    (i0 <= i1).then_some((i0, i1))
}

/// Subtract the per-trial, per-channel mean over samples `i0..=i1`.
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, i0: usize, i1: usize) {
    let (n_e, n_c, _n_t) = epochs.dim();
    for e in 0..n_e {
        for c in 0..n_c {
            let m = epochs.slice(s![e, c, i0..=i1]).mean().unwrap_or(0.0);
            epochs.slice_mut(s![e, c, ..]).mapv_inplace(|v| v - m);
        }
    }
}
