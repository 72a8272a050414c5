//! Robust averaging and windowed ERP features.
//!
//! * [`trimmed_mean`]: `scipy.stats.trim_mean` along the trial axis,
//!   independently for every (channel, sample).
//! * [`combine_evoked`]: weighted sum of evokeds, as `mne.combine_evoked`.
//! * [`mean_amplitude`] / [`peak_to_peak`]: single-channel features over
//!   the inclusive sample range `[index(tmin), index(tmax)]`, in µV.
use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView3, Axis};
use serde::Serialize;

use crate::conditions::ConditionSet;
use crate::epoch::TrialSet;
use crate::error::{PipelineError, Result};

/// Volts → microvolts.
pub const UV: f64 = 1e6;

/// Canonical RewP channel.
pub const REWP_CHANNEL: &str = "FCz";
/// Canonical RewP window in seconds.
pub const REWP_WINDOW: (f64, f64) = (0.240, 0.340);

/// Averaged waveform of one condition. Read-only once built; new evokeds
/// come from [`average`] or [`combine_evoked`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evoked {
    data: Array2<f64>,
    ch_names: Vec<String>,
    sfreq: f64,
    tmin: f64,
    nave: f64,
    comment: String,
}

impl Evoked {
    pub fn new(
        data: Array2<f64>,
        ch_names: Vec<String>,
        sfreq: f64,
        tmin: f64,
        nave: f64,
        comment: impl Into<String>,
    ) -> Result<Self> {
        if ch_names.len() != data.nrows() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} channel names for {} rows",
                ch_names.len(),
                data.nrows()
            )));
        }
        if !(sfreq > 0.0) {
            return Err(PipelineError::InvalidParameter(format!("sampling rate must be > 0, got {sfreq}")));
        }
        Ok(Self { data, ch_names, sfreq, tmin, nave, comment: comment.into() })
    }

    /// `[C, T]` in volts.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    /// Time of the first sample.
    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    /// Effective number of averaged trials.
    pub fn nave(&self) -> f64 {
        self.nave
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.n_times()).map(|i| self.tmin + i as f64 / self.sfreq).collect()
    }

    /// `trunc((t − tmin) · sfreq)` clamped to the time axis.
    pub fn time_as_index(&self, t: f64) -> usize {
        let raw = ((t - self.tmin) * self.sfreq + 1e-9).trunc();
        (raw.max(0.0) as usize).min(self.n_times().saturating_sub(1))
    }

    /// Inclusive sample range of `[tmin, tmax]`. A window that only partly
    /// covers the time axis is clamped to it; one that misses it entirely is
    /// an error.
    pub fn window_indices(&self, tmin: f64, tmax: f64) -> Result<(usize, usize)> {
        let n = self.n_times();
        let pos = |t: f64| (t - self.tmin) * self.sfreq;
        let (p0, p1) = (pos(tmin) + 1e-9, pos(tmax) + 1e-9);
        let last = n as f64 - 1.0;
        if n == 0 || tmax < tmin || p1 < 0.0 || p0 > last + 2e-9 {
            let end = self.tmin + last / self.sfreq;
            return Err(PipelineError::InvalidParameter(format!(
                "window {tmin}..{tmax} s lies outside the evoked axis {}..{end} s",
                self.tmin
            )));
        }
        Ok((p0.max(0.0).trunc() as usize, p1.min(last).trunc() as usize))
    }

    fn channel(&self, name: &str) -> Result<usize> {
        self.ch_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))
    }

    fn same_axes(&self, other: &Evoked) -> bool {
        self.ch_names == other.ch_names
            && self.n_times() == other.n_times()
            && self.sfreq == other.sfreq
            && (self.tmin - other.tmin).abs() < 0.5 / self.sfreq
    }
}

/// Trimmed mean over axis 0 of `[E, C, T]`.
///
/// `floor(p · n)` values are cut from each end of every sorted
/// (channel, sample) column; `p = 0` is the arithmetic mean.
pub fn trimmed_mean(trials: ArrayView3<f64>, proportiontocut: f64) -> Result<Array2<f64>> {
    let (n, n_c, n_t) = trials.dim();
    if n == 0 {
        return Err(PipelineError::EmptyTrialSet("trimmed mean of zero trials".into()));
    }
    if !(0.0..0.5).contains(&proportiontocut) {
        return Err(PipelineError::InvalidParameter(format!(
            "proportiontocut {proportiontocut} outside [0, 0.5)"
        )));
    }
    let lowercut = (proportiontocut * n as f64).floor() as usize;
    let uppercut = n - lowercut;
    if lowercut >= uppercut {
        return Err(PipelineError::InvalidParameter("proportion too big".into()));
    }
    if lowercut == 0 {
        return trials
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::EmptyTrialSet("mean of zero trials".into()));
    }

    let mut out = Array2::<f64>::zeros((n_c, n_t));
    let mut column = vec![0.0; n];
    for c in 0..n_c {
        for t in 0..n_t {
            for (e, v) in column.iter_mut().enumerate() {
                *v = trials[[e, c, t]];
            }
            column.sort_by(f64::total_cmp);
            let kept = &column[lowercut..uppercut];
            out[[c, t]] = kept.iter().sum::<f64>() / kept.len() as f64;
        }
    }
    Ok(out)
}

/// Robust average of a trial set.
pub fn average(trials: &TrialSet, proportiontocut: f64, comment: &str) -> Result<Evoked> {
    Ok(Evoked {
        data: trimmed_mean(trials.data.view(), proportiontocut)?,
        ch_names: trials.ch_names.clone(),
        sfreq: trials.sfreq,
        tmin: trials.tmin,
        nave: trials.n_trials() as f64,
        comment: comment.to_string(),
    })
}

/// One evoked per feedback condition. Conditions without trials are skipped
/// with a warning.
pub fn evokeds_by_condition(
    trials: &TrialSet,
    conditions: &ConditionSet,
    proportiontocut: f64,
) -> Result<BTreeMap<String, Evoked>> {
    let mut out = BTreeMap::new();
    for cond in &conditions.feedback_locked {
        let subset = trials.select_labels(&cond.markers);
        if subset.is_empty() {
            log::warn!("condition '{}' has no trials, skipped", cond.name);
            continue;
        }
        out.insert(cond.name.clone(), average(&subset, proportiontocut, &cond.name)?);
    }
    Ok(out)
}

/// `Σ wᵢ · evokedᵢ`; `nave = 1 / Σ (wᵢ² / naveᵢ)`.
pub fn combine_evoked(parts: &[(&Evoked, f64)]) -> Result<Evoked> {
    let (first, _) = parts
        .first()
        .ok_or_else(|| PipelineError::EmptyTrialSet("nothing to combine".into()))?;
    if let Some((bad, _)) = parts.iter().find(|(e, _)| !first.same_axes(e)) {
        return Err(PipelineError::ShapeMismatch(format!(
            "cannot combine '{}' with '{}': channels or times differ",
            first.comment, bad.comment
        )));
    }
    let mut data = Array2::<f64>::zeros(first.data.raw_dim());
    for (e, w) in parts {
        data.scaled_add(*w, &e.data);
    }
    let inv_nave: f64 = parts.iter().map(|(e, w)| w * w / e.nave).sum();
    let comment = parts
        .iter()
        .map(|(e, w)| format!("{w:+.3} × {}", e.comment))
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Evoked {
        data,
        ch_names: first.ch_names.clone(),
        sfreq: first.sfreq,
        tmin: first.tmin,
        nave: 1.0 / inv_nave,
        comment,
    })
}

/// Equal-weight average of several evokeds.
pub fn combine_equal(evokeds: &[&Evoked]) -> Result<Evoked> {
    let w = 1.0 / evokeds.len().max(1) as f64;
    let parts: Vec<(&Evoked, f64)> = evokeds.iter().map(|&e| (e, w)).collect();
    combine_evoked(&parts)
}

/// `win − loss`.
pub fn difference_wave(win: &Evoked, loss: &Evoked) -> Result<Evoked> {
    combine_evoked(&[(win, 1.0), (loss, -1.0)])
}

/// Equal-weight grand averages of every `Win` and every `Loss` condition.
pub fn grand_win_loss(evokeds: &BTreeMap<String, Evoked>) -> Result<(Evoked, Evoked)> {
    let pick = |tag: &str| -> Result<Evoked> {
        let sel: Vec<&Evoked> = evokeds.iter().filter(|(k, _)| k.contains(tag)).map(|(_, e)| e).collect();
        if sel.is_empty() {
            return Err(PipelineError::EmptyTrialSet(format!("no '{tag}' conditions")));
        }
        combine_equal(&sel)
    };
    Ok((pick("Win")?, pick("Loss")?))
}

/// Mean of one channel over `[index(tmin), index(tmax)]`, in µV. Fails when
/// the window does not overlap the evoked axis.
pub fn mean_amplitude(evoked: &Evoked, ch_name: &str, tmin: f64, tmax: f64) -> Result<f64> {
    let c = evoked.channel(ch_name)?;
    let (i0, i1) = evoked.window_indices(tmin, tmax)?;
    let row = evoked.data.row(c);
    let seg = row.slice(ndarray::s![i0..=i1]);
    Ok(seg.sum() / seg.len() as f64 * UV)
}

/// Peak-to-peak result in the feature window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakToPeak {
    /// `(max − min)` in µV.
    pub amplitude_uv: f64,
    pub neg_time_ms: f64,
    pub pos_time_ms: f64,
    /// Raw peak values in volts.
    pub neg_value: f64,
    pub pos_value: f64,
}

/// Minimum and maximum searched independently over the same window; the
/// first occurrence wins on ties.
pub fn peak_to_peak(evoked: &Evoked, ch_name: &str, tmin: f64, tmax: f64) -> Result<PeakToPeak> {
    let c = evoked.channel(ch_name)?;
    let (i0, i1) = evoked.window_indices(tmin, tmax)?;
    let row = evoked.data.row(c);
    let (mut n_idx, mut p_idx) = (i0, i0);
    for i in i0..=i1 {
        if row[i] < row[n_idx] {
            n_idx = i;
        }
        if row[i] > row[p_idx] {
            p_idx = i;
        }
    }
    let t = |i: usize| (evoked.tmin + i as f64 / evoked.sfreq) * 1000.0;
    Ok(PeakToPeak {
        amplitude_uv: (row[p_idx] - row[n_idx]) * UV,
        neg_time_ms: t(n_idx),
        pos_time_ms: t(p_idx),
        neg_value: row[n_idx],
        pos_value: row[p_idx],
    })
}

/// RewP difference wave features at [`REWP_CHANNEL`] over [`REWP_WINDOW`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewpMetrics {
    pub mean_amplitude_uv: f64,
    pub peak_to_peak: PeakToPeak,
}

/// Grand win − grand loss, then both features.
pub fn rewp_metrics(evokeds: &BTreeMap<String, Evoked>) -> Result<RewpMetrics> {
    let (win, loss) = grand_win_loss(evokeds)?;
    let diff = difference_wave(&win, &loss)?;
    let (t0, t1) = REWP_WINDOW;
    let metrics = RewpMetrics {
        mean_amplitude_uv: mean_amplitude(&diff, REWP_CHANNEL, t0, t1)?,
        peak_to_peak: peak_to_peak(&diff, REWP_CHANNEL, t0, t1)?,
    };
    log::info!(
        "RewP mean amplitude {:.2} µV, peak-to-peak {:.2} µV",
        metrics.mean_amplitude_uv,
        metrics.peak_to_peak.amplitude_uv
    );
    Ok(metrics)
}
