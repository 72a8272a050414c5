//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! Transition bandwidths follow MNE's `'auto'` rules:
//!   • low edge  `l_tb = min(max(0.25·l_freq, 2.0), l_freq)`
//!   • high edge `h_tb = min(max(0.25·h_freq, 2.0), sfreq/2 − h_freq)`
//!   • length N  `= ceil(3.3 / min(tb) · sfreq)`, rounded to odd
//!
//! Band-pass kernels are the difference of two unit-DC lowpasses with
//! cutoffs at the transition midpoints; band-stop kernels are the spectral
//! inverse of a band-pass.
use std::f64::consts::PI;

use crate::error::{PipelineError, Result};

/// Low-edge transition bandwidth: `min(max(0.25 · l_freq, 2.0), l_freq)`.
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// High-edge transition bandwidth, capped by the distance to Nyquist.
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Taps for a transition bandwidth: `ceil(3.3 · sfreq / trans_bw)`, made odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    n | 1
}

/// Zero-phase band-pass kernel. Either edge may be `None` (pure highpass or
/// lowpass).
pub fn design_bandpass(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    if let (Some(l), Some(h)) = (l_freq, h_freq) {
        if l >= h {
            return Err(PipelineError::InvalidParameter(format!("l_freq {l} >= h_freq {h}")));
        }
    }
    for f in [l_freq, h_freq].into_iter().flatten() {
        if !(f > 0.0 && f < nyq) {
            return Err(PipelineError::InvalidParameter(format!(
                "cutoff {f} Hz outside (0, {nyq}) Hz"
            )));
        }
    }

    let l_tb = l_freq.map(auto_trans_bandwidth);
    let h_tb = h_freq.map(|h| auto_trans_bandwidth_high(h, sfreq));
    let tb = match (l_tb, h_tb) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return Err(PipelineError::InvalidParameter("no cutoff given".into())),
    };
    let n = auto_filter_length(tb, sfreq);

    // Upper passband edge: lowpass at h + h_tb/2, or a delta (all-pass).
    let mut h = match (h_freq, h_tb) {
        (Some(hf), Some(tb)) => lowpass(n, hf + tb / 2.0, sfreq),
        _ => delta(n),
    };
    if let (Some(lf), Some(tb)) = (l_freq, l_tb) {
        let lp = lowpass(n, lf - tb / 2.0, sfreq);
        h.iter_mut().zip(lp.iter()).for_each(|(a, b)| *a -= b);
    }
    Ok(h)
}

/// Band-stop kernel around the mains frequency `f0`.
///
/// Matches `notch_filter(freqs=f0, method='fir')` defaults: stop width
/// `f0/200`, transition bandwidth 1 Hz on each side.
pub fn design_notch(f0: f64, sfreq: f64) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    if !(f0 > 0.0 && f0 < nyq) {
        return Err(PipelineError::InvalidParameter(format!("notch {f0} Hz outside (0, {nyq}) Hz")));
    }
    let width = f0 / 200.0;
    let trans_bw = 1.0;
    let n = auto_filter_length(trans_bw / 2.0, sfreq);
    let lo = f0 - width / 2.0 - trans_bw / 4.0;
    let hi = f0 + width / 2.0 + trans_bw / 4.0;

    // delta − (lp(hi) − lp(lo))
    let lp_hi = lowpass(n, hi.min(nyq), sfreq);
    let lp_lo = lowpass(n, lo, sfreq);
    let mut h: Vec<f64> = lp_lo.iter().zip(lp_hi.iter()).map(|(a, b)| a - b).collect();
    h[n / 2] += 1.0;
    Ok(h)
}

/// Hamming-windowed sinc lowpass with unit DC gain and its -6 dB point at
/// `cutoff_hz`. `n` is odd, so the kernel is symmetric about `n / 2`.
pub fn lowpass(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    let fc = 2.0 * cutoff_hz / sfreq;
    let centre = (n / 2) as f64;
    let mut h: Vec<f64> = hamming(n)
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            let x = i as f64 - centre;
            w * if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) }
        })
        .collect();
    let dc: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= dc);
    h
}

pub fn hamming(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    let step = 2.0 * PI / (n - 1) as f64;
    (0..n).map(|i| 0.54 - 0.46 * (step * i as f64).cos()).collect()
}

fn delta(n: usize) -> Vec<f64> {
    let mut h = vec![0.0; n];
    h[n / 2] = 1.0;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    /// |H(f)| of a kernel evaluated by direct DTFT.
    fn gain(h: &[f64], f: f64, sfreq: f64) -> f64 {
        let w = 2.0 * PI * f / sfreq;
        let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &v)| {
            (re + v * (w * k as f64).cos(), im - v * (w * k as f64).sin())
        });
        (re * re + im * im).sqrt()
    }

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.1, 0.5, 1.0, 2.0, 5.0] {
            let n = auto_filter_length(auto_trans_bandwidth(l_freq), 250.0);
            assert_eq!(n % 2, 1, "{n} taps for l_freq={l_freq}");
        }
    }

    #[test]
    fn bandpass_length_from_narrowest_band() {
        // 0.1 Hz low edge → 0.1 Hz transition → 8251 taps at 250 Hz.
        let h = design_bandpass(Some(0.1), Some(30.0), 250.0).unwrap();
        assert_eq!(h.len(), 8251);
    }

    #[test]
    fn bandpass_passes_mid_band_and_blocks_dc() {
        let h = design_bandpass(Some(1.0), Some(30.0), 250.0).unwrap();
        let dc: f64 = h.iter().sum();
        assert!(dc.abs() < 1e-6, "DC gain {dc}");
        let g10 = gain(&h, 10.0, 250.0);
        assert!((g10 - 1.0).abs() < 1e-2, "10 Hz gain {g10}");
        assert!(gain(&h, 60.0, 250.0) < 1e-2);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_bandpass(Some(1.0), Some(30.0), 250.0).unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn notch_removes_mains_only() {
        let h = design_notch(50.0, 250.0).unwrap();
        assert!(gain(&h, 50.0, 250.0) < 0.05);
        assert!((gain(&h, 10.0, 250.0) - 1.0).abs() < 1e-2);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn bad_cutoffs_rejected() {
        assert!(design_bandpass(Some(30.0), Some(1.0), 250.0).is_err());
        assert!(design_bandpass(None, Some(200.0), 250.0).is_err());
        assert!(design_notch(150.0, 250.0).is_err());
    }

    #[test]
    fn lowpass_has_unit_dc_and_half_gain_at_cutoff() {
        let h = lowpass(201, 20.0, 250.0);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(gain(&h, 20.0, 250.0), 0.5, epsilon = 0.02);
    }
}
