//! Event-locked epoching.
//!
//! Cuts `[C, T]` continuous data into a `[E, C, n_times]` tensor around
//! event markers. With `start = round(tmin·sfreq)` and
//! `stop = round(tmax·sfreq)` every trial spans `stop − start + 1` samples
//! and `times[i] = (start + i) / sfreq`. Trials keep the chronological
//! order of their markers. The tensor is a copy; dropping trials never
//! touches the parent [`Signal`].
use ndarray::{s, Array3, Axis};

use crate::config::EpochWindow;
use crate::error::{PipelineError, Result};
use crate::events::{EventMarker, EventVocabulary};
use crate::normalize::{baseline_correct_inplace, baseline_range};
use crate::signal::Signal;

/// Window offsets `(start, stop)` in samples relative to the marker.
pub fn window_offsets(window: &EpochWindow, sfreq: f64) -> (i64, i64) {
    let start = (window.tmin * sfreq).round() as i64;
    let stop = (window.tmax * sfreq).round() as i64;
    (start, stop)
}

/// Samples per trial for `window` at `sfreq`.
pub fn n_times(window: &EpochWindow, sfreq: f64) -> usize {
    let (start, stop) = window_offsets(window, sfreq);
    (stop - start + 1).max(0) as usize
}

/// Stimulus-locked trials.
#[derive(Debug, Clone)]
pub struct TrialSet {
    /// `[E, C, T]` samples.
    pub data: ndarray::Array3<f64>,
    pub ch_names: Vec<String>,
    pub sfreq: f64,
    /// Time of the first sample, `round(tmin·sfreq) / sfreq`.
    pub tmin: f64,
    /// Event code per trial.
    pub codes: Vec<i32>,
    /// Marker sample per trial (in the parent signal).
    pub samples: Vec<usize>,
    /// Position of each trial in the selected-event list it was cut from.
    pub selection: Vec<usize>,
    pub vocabulary: EventVocabulary,
    pub baseline: Option<(Option<f64>, Option<f64>)>,
}

impl TrialSet {
    #[inline]
    pub fn n_trials(&self) -> usize {
        self.data.shape()[0]
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.shape()[1]
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn is_empty(&self) -> bool {
        self.n_trials() == 0
    }

    /// Time axis in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.n_times()).map(|i| self.tmin + i as f64 / self.sfreq).collect()
    }

    /// Label of trial `i`.
    pub fn label(&self, i: usize) -> &str {
        self.vocabulary.label(self.codes[i]).unwrap_or("")
    }

    /// Keep the trials at `idx`, in the given order.
    pub fn take(&self, idx: &[usize]) -> TrialSet {
        TrialSet {
            data: self.data.select(Axis(0), idx),
            ch_names: self.ch_names.clone(),
            sfreq: self.sfreq,
            tmin: self.tmin,
            codes: idx.iter().map(|&i| self.codes[i]).collect(),
            samples: idx.iter().map(|&i| self.samples[i]).collect(),
            selection: idx.iter().map(|&i| self.selection[i]).collect(),
            vocabulary: self.vocabulary.clone(),
            baseline: self.baseline,
        }
    }

    /// Remove the trials at `idx` (indices into this set).
    pub fn drop(&self, idx: &[usize]) -> TrialSet {
        let keep: Vec<usize> = (0..self.n_trials()).filter(|i| !idx.contains(i)).collect();
        self.take(&keep)
    }

    /// Contiguous trial range `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> TrialSet {
        let idx: Vec<usize> = (start..end.min(self.n_trials())).collect();
        self.take(&idx)
    }

    /// Trials whose label is one of `labels`, chronological order kept.
    pub fn select_labels(&self, labels: &[String]) -> TrialSet {
        let idx: Vec<usize> = (0..self.n_trials())
            .filter(|&i| labels.iter().any(|l| l == self.label(i)))
            .collect();
        self.take(&idx)
    }

    /// Stack trial sets with identical channels and time axes.
    pub fn concatenate(sets: &[TrialSet]) -> Result<TrialSet> {
        let first = sets
            .first()
            .ok_or_else(|| PipelineError::EmptyTrialSet("nothing to concatenate".into()))?;
        for s in &sets[1..] {
            if s.ch_names != first.ch_names || s.n_times() != first.n_times() || s.sfreq != first.sfreq {
                return Err(PipelineError::ShapeMismatch(
                    "concatenated trial sets must share channels and time axis".into(),
                ));
            }
        }
        let views: Vec<_> = sets.iter().map(|s| s.data.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| PipelineError::ShapeMismatch(e.to_string()))?;
        Ok(TrialSet {
            data,
            ch_names: first.ch_names.clone(),
            sfreq: first.sfreq,
            tmin: first.tmin,
            codes: sets.iter().flat_map(|s| s.codes.iter().copied()).collect(),
            samples: sets.iter().flat_map(|s| s.samples.iter().copied()).collect(),
            selection: sets.iter().flat_map(|s| s.selection.iter().copied()).collect(),
            vocabulary: first.vocabulary.clone(),
            baseline: first.baseline,
        })
    }
}

/// Markers whose label is in `labels`, chronological order kept.
pub fn select_events(events: &[EventMarker], vocab: &EventVocabulary, labels: &[&str]) -> Vec<EventMarker> {
    let codes: Vec<i32> = labels.iter().filter_map(|l| vocab.code(l)).collect();
    events.iter().filter(|e| codes.contains(&e.code)).copied().collect()
}

/// Cut one trial per marker; markers whose window leaves the recording are
/// skipped with a warning. Baseline correction is applied when the window
/// asks for it.
pub fn epoch_events(
    signal: &Signal,
    events: &[EventMarker],
    vocabulary: &EventVocabulary,
    window: &EpochWindow,
) -> Result<TrialSet> {
    let (start, stop) = window_offsets(window, signal.sfreq);
    if stop < start {
        return Err(PipelineError::InvalidParameter(format!(
            "epoch window tmax {} < tmin {}",
            window.tmax, window.tmin
        )));
    }
    let n_t = (stop - start + 1) as usize;
    let n_ch = signal.n_channels();
    let total = signal.n_times() as i64;

    let mut kept: Vec<(usize, EventMarker, usize)> = Vec::with_capacity(events.len());
    for (i, ev) in events.iter().enumerate() {
        let first = ev.sample as i64 + start;
        let last = ev.sample as i64 + stop;
        if first < 0 || last >= total {
            log::warn!("event at sample {} outside recording, skipped", ev.sample);
            continue;
        }
        kept.push((i, *ev, first as usize));
    }

    let mut data = Array3::<f64>::zeros((kept.len(), n_ch, n_t));
    for (e, &(_, _, first)) in kept.iter().enumerate() {
        data.slice_mut(s![e, .., ..])
            .assign(&signal.data.slice(s![.., first..first + n_t]));
    }

    let tmin = start as f64 / signal.sfreq;
    let mut trials = TrialSet {
        data,
        ch_names: signal.ch_names.clone(),
        sfreq: signal.sfreq,
        tmin,
        codes: kept.iter().map(|k| k.1.code).collect(),
        samples: kept.iter().map(|k| k.1.sample).collect(),
        selection: kept.iter().map(|k| k.0).collect(),
        vocabulary: vocabulary.clone(),
        baseline: window.baseline,
    };

    if let Some((bmin, bmax)) = window.baseline {
        let times = trials.times();
        let (i0, i1) = baseline_range(&times, signal.sfreq, bmin, bmax).ok_or_else(|| {
            PipelineError::InvalidParameter(format!("baseline {bmin:?}..{bmax:?} outside window"))
        })?;
        baseline_correct_inplace(&mut trials.data, i0, i1);
    }
    Ok(trials)
}
