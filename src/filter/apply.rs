//! Overlap-add zero-phase FIR convolution.
//!
//! Matches MNE's `_overlap_add_filter` + `_1d_overlap_filter`.
//!
//! Zero-phase is achieved by shifting the output left by `(N-1)/2` samples,
//! NOT by running filtfilt. The edge transient is suppressed by
//! reflect-limited padding of `N-1` samples on each side.
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{PipelineError, Result};

/// Apply a zero-phase FIR filter to each channel of `data` ([C, T]) in-place.
///
/// `h` must have odd length.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    if h.len() % 2 == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "FIR kernel must have odd length, got {}",
            h.len()
        )));
    }
    let h_fft_cache = FilterPlan::new(h, data.ncols());
    for mut row in data.rows_mut() {
        let x: Vec<f64> = row.to_vec();
        let y = h_fft_cache.run(&x);
        row.assign(&ndarray::ArrayView1::from(&y));
    }
    Ok(())
}

/// Filter a single 1-D signal with the overlap-add algorithm.
///
/// Returns a vector of the same length as `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Vec<f64> {
    FilterPlan::new(h, x.len()).run(x)
}

/// Kernel spectrum and FFT plans shared by every channel of one recording.
struct FilterPlan {
    n_h:   usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd:   std::sync::Arc<dyn rustfft::Fft<f64>>,
    inv:   std::sync::Arc<dyn rustfft::Fft<f64>>,
}

impl FilterPlan {
    fn new(h: &[f64], n_x: usize) -> Self {
        let n_h = h.len();
        let n_edge = n_h.saturating_sub(1);
        let n_fft = choose_fft_len(n_h, n_x + 2 * n_edge);
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);
        let mut h_fft: Vec<Complex<f64>> = h
            .iter()
            .map(|&v| Complex { re: v, im: 0.0 })
            .chain(std::iter::repeat(Complex::default()))
            .take(n_fft)
            .collect();
        fwd.process(&mut h_fft);
        Self { n_h, n_fft, h_fft, fwd, inv }
    }

    fn run(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return vec![];
        }
        let n_edge = self.n_h - 1;
        // Zero phase: the output is advanced by half the (odd) kernel length.
        let shift = n_edge / 2;
        let x_ext = reflect_limited_pad(x, n_edge, n_edge);
        let n_ext = x_ext.len();
        let block = self.n_fft - self.n_h + 1;
        let scale = 1.0 / self.n_fft as f64;

        let mut acc = vec![0.0_f64; n_ext];
        let mut buf = vec![Complex::default(); self.n_fft];
        for (k, chunk) in x_ext.chunks(block).enumerate() {
            let start = k * block;
            buf.fill(Complex::default());
            for (b, &v) in buf.iter_mut().zip(chunk) {
                b.re = v;
            }
            self.fwd.process(&mut buf);
            for (b, h) in buf.iter_mut().zip(&self.h_fft) {
                *b *= *h;
            }
            self.inv.process(&mut buf);

            // Product sample p of this block lands at start + p − shift.
            for (p, y) in buf.iter().enumerate().skip(shift.saturating_sub(start)) {
                let o = start + p - shift;
                if o >= n_ext {
                    break;
                }
                acc[o] += y.re * scale;
            }
        }
        acc[n_edge..n_edge + x.len()].to_vec()
    }
}

/// Odd reflection about the end samples, as MNE's `_smart_pad`:
/// `2·x[0] − x[i]` on the left, `2·x[n−1] − x[n−1−i]` on the right.
/// Requests longer than the signal are topped up with zeros.
pub(crate) fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let (l, r) = (n_l.min(n - 1), n_r.min(n - 1));
    let left = (1..=l).rev().map(|i| 2.0 * first - x[i]);
    let right = (1..=r).map(|i| 2.0 * last - x[n - 1 - i]);
    std::iter::repeat(0.0)
        .take(n_l - l)
        .chain(left)
        .chain(x.iter().copied())
        .chain(right)
        .chain(std::iter::repeat(0.0).take(n_r - r))
        .collect()
}

/// Power-of-two block size with the lowest overlap-add cost under MNE's
/// model `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_pow = ((2 * n_h - 1) as f64).log2().ceil() as u32;
    let max_pow = ((n_x.max(2) as f64).log2().ceil() as u32 + 1).max(min_pow);
    let cost = |pow: u32| {
        let n = (1_usize << pow) as f64;
        let blocks = (n_x as f64 / (n - n_h as f64 + 1.0)).ceil();
        blocks * n * (pow as f64 + 1.0) + 4e-5 * n * n_x as f64
    };
    let best = (min_pow..=max_pow)
        .min_by(|&a, &b| cost(a).total_cmp(&cost(b)))
        .unwrap_or(max_pow);
    1 << best
}
