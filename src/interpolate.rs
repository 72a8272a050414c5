//! Spherical-spline interpolation of bad channels.
//!
//! Matches `inst.interpolate_bads(reset_bads=True)` for EEG (Perrin et al.,
//! 1989, as in `mne/channels/interpolation.py`):
//!
//! ```text
//! g(x)  = Σ_{n=1}^{7} (2n+1) / (4π nᵐ (n+1)ᵐ) · Pₙ(x),   m = 4
//! C     = [[G_from + αI, 1], [1ᵀ, 0]],                 α = 1e-5
//! W     = [G_to_from, 1] · pinv(C)[:, :-1]
//! ```
//!
//! Positions are projected on the unit sphere around `origin` before the
//! cosine of every pair is taken.
use nalgebra::DMatrix;
use ndarray::{Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::signal::Signal;

const STIFFNESS: i32 = 4;
const N_LEGENDRE_TERMS: usize = 7;
const ALPHA: f64 = 1e-5;

/// Legendre series `g(cos θ)`.
fn calc_g(cosang: f64) -> f64 {
    let x = cosang.clamp(-1.0, 1.0);
    let (mut p_prev, mut p) = (1.0, x);
    let mut g = 0.0;
    for n in 1..=N_LEGENDRE_TERMS {
        let nf = n as f64;
        let factor = (2.0 * nf + 1.0)
            / (nf.powi(STIFFNESS) * (nf + 1.0).powi(STIFFNESS) * 4.0 * std::f64::consts::PI);
        g += factor * p;
        let p_next = ((2.0 * nf + 1.0) * x * p - nf * p_prev) / (nf + 1.0);
        p_prev = p;
        p = p_next;
    }
    g
}

fn unit_rows(pos: &Array2<f64>, origin: [f64; 3]) -> Array2<f64> {
    let mut out = pos.clone();
    for mut row in out.rows_mut() {
        for (v, o) in row.iter_mut().zip(origin) {
            *v -= o;
        }
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    out
}

/// `[n_to, n_from]` weights mapping good-channel data to bad channels.
pub fn interpolation_matrix(pos_from: &Array2<f64>, pos_to: &Array2<f64>, origin: [f64; 3]) -> Result<Array2<f64>> {
    let from = unit_rows(pos_from, origin);
    let to = unit_rows(pos_to, origin);
    let n_from = from.nrows();
    let n_to = to.nrows();
    if n_from == 0 {
        return Err(PipelineError::InvalidParameter("no good channels to interpolate from".into()));
    }

    let mut c = DMatrix::<f64>::zeros(n_from + 1, n_from + 1);
    for i in 0..n_from {
        for j in 0..n_from {
            c[(i, j)] = calc_g(from.row(i).dot(&from.row(j)));
        }
        c[(i, i)] += ALPHA;
        c[(i, n_from)] = 1.0;
        c[(n_from, i)] = 1.0;
    }
    let c_inv = c
        .pseudo_inverse(1e-14)
        .map_err(|e| PipelineError::Linalg(e.to_string()))?;

    let mut g_to = DMatrix::<f64>::zeros(n_to, n_from + 1);
    for i in 0..n_to {
        for j in 0..n_from {
            g_to[(i, j)] = calc_g(to.row(i).dot(&from.row(j)));
        }
        g_to[(i, n_from)] = 1.0;
    }
    let w = g_to * c_inv.columns(0, n_from);
    Ok(Array2::from_shape_fn((n_to, n_from), |(i, j)| w[(i, j)]))
}

/// Reconstruct every channel in `signal.bads` from the good channels and
/// clear the bads set. A no-op when nothing is marked.
pub fn interpolate_bads(signal: &Signal, origin: [f64; 3]) -> Result<Signal> {
    if signal.bads.is_empty() {
        log::info!("no bad channels marked for interpolation");
        return Ok(signal.clone());
    }
    let bads: Vec<String> = signal.bads.iter().cloned().collect();
    let pos = signal
        .chan_pos
        .as_ref()
        .ok_or_else(|| PipelineError::MissingChannelPositions(bads.clone()))?;
    let finite = |i: usize| pos.row(i).iter().all(|v| v.is_finite());

    let bad_idx = bads
        .iter()
        .map(|b| signal.require_channel(b))
        .collect::<Result<Vec<usize>>>()?;
    let unplaced: Vec<String> = bad_idx
        .iter()
        .filter(|&&i| !finite(i))
        .map(|&i| signal.ch_names[i].clone())
        .collect();
    if !unplaced.is_empty() {
        return Err(PipelineError::MissingChannelPositions(unplaced));
    }
    let good_idx: Vec<usize> = signal.good_indices().into_iter().filter(|&i| finite(i)).collect();

    log::info!("interpolating bad channels {bads:?} from {} channels", good_idx.len());
    let w = interpolation_matrix(&pos.select(Axis(0), &good_idx), &pos.select(Axis(0), &bad_idx), origin)?;
    let filled = w.dot(&signal.data.select(Axis(0), &good_idx));

    let mut out = signal.clone();
    for (row, &i) in filled.rows().into_iter().zip(&bad_idx) {
        out.data.row_mut(i).assign(&row);
    }
    out.bads.clear();
    Ok(out)
}
