//! Trial rejection strategies.
//!
//! Both strategies share one contract, [`TrialRejector::reject`]:
//! `(signal, events, labels, window) → (kept trials, report)`.
//!
//! * [`CustomRejector`] cuts every trial, runs the four-criterion
//!   [`artifact::detect`](crate::artifact::detect), records the blamed
//!   channels, and only then removes the flagged trials.
//! * [`BuiltinRejector`] checks peak-to-peak against a maximum and a flat
//!   floor on the continuous data and only materialises the survivors.
//!
//! Report keys are trial indices *before* any drop: position among the
//! in-bounds trials cut for the selected labels.
use std::collections::BTreeMap;

use ndarray::s;
use serde::Serialize;

use crate::artifact;
use crate::config::{ArtifactThresholds, BuiltinThresholds, EpochWindow, RejectionConfig};
use crate::epoch::{epoch_events, select_events, window_offsets, TrialSet};
use crate::error::Result;
use crate::events::{EventMarker, EventVocabulary};
use crate::signal::Signal;

/// Pre-drop trial index → channels blamed for its rejection, in channel
/// order. Indices not present were kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RejectionReport(BTreeMap<usize, Vec<String>>);

impl RejectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trial: usize, channels: Vec<String>) {
        self.0.insert(trial, channels);
    }

    /// Number of rejected trials.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_rejected(&self, trial: usize) -> bool {
        self.0.contains_key(&trial)
    }

    pub fn channels(&self, trial: usize) -> Option<&[String]> {
        self.0.get(&trial).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.0.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    pub fn rejected_indices(&self) -> Vec<usize> {
        self.0.keys().copied().collect()
    }
}

/// Output of a rejection pass.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Surviving trials.
    pub trials: TrialSet,
    pub report: RejectionReport,
    /// Trial count before rejection (denominator for channel statistics).
    pub n_total: usize,
    /// Requested labels the signal never contained.
    pub missing_labels: Vec<String>,
}

impl Rejection {
    pub fn n_rejected(&self) -> usize {
        self.report.len()
    }
}

/// Shared rejection contract.
pub trait TrialRejector {
    fn reject(&self, signal: &Signal, events: &[EventMarker], vocabulary: &EventVocabulary, labels: &[String], window: &EpochWindow) -> Result<Rejection>;
}

/// Four-criterion threshold rejection.
#[derive(Debug, Clone, Copy)]
pub struct CustomRejector {
    pub thresholds: ArtifactThresholds,
}

/// Peak-to-peak maximum and flat floor, applied to every channel.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRejector {
    pub thresholds: BuiltinThresholds,
}

/// Which threshold set of a profile to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Long window cut for decomposition fitting.
    Ica,
    /// Final ERP window.
    Erp,
}

impl RejectionConfig {
    /// Strategy configured for `stage`.
    pub fn rejector(&self, stage: Stage) -> Box<dyn TrialRejector> {
        match (*self, stage) {
            (RejectionConfig::Custom { ica, .. }, Stage::Ica) => Box::new(CustomRejector { thresholds: ica }),
            (RejectionConfig::Custom { erp, .. }, Stage::Erp) => Box::new(CustomRejector { thresholds: erp }),
            (RejectionConfig::Builtin { ica, .. }, Stage::Ica) => Box::new(BuiltinRejector { thresholds: ica }),
            (RejectionConfig::Builtin { erp, .. }, Stage::Erp) => Box::new(BuiltinRejector { thresholds: erp }),
        }
    }
}

/// Present labels and the missing ones (logged).
fn resolve_labels(vocabulary: &EventVocabulary, labels: &[String]) -> (Vec<String>, Vec<String>) {
    let (present, missing) = vocabulary.partition(labels);
    for m in &missing {
        log::warn!("event label '{m}' not found in recording, excluded");
    }
    (
        present.into_iter().map(String::from).collect(),
        missing.into_iter().map(String::from).collect(),
    )
}

impl TrialRejector for CustomRejector {
    fn reject(&self, signal: &Signal, events: &[EventMarker], vocabulary: &EventVocabulary, labels: &[String], window: &EpochWindow) -> Result<Rejection> {
        let (present, missing_labels) = resolve_labels(vocabulary, labels);
        let refs: Vec<&str> = present.iter().map(String::as_str).collect();
        let selected = select_events(events, vocabulary, &refs);
        let trials = epoch_events(signal, &selected, vocabulary, window)?;
        let n_total = trials.n_trials();

        let mask = artifact::detect(trials.data.view(), &self.thresholds);

        // Report first: indices must refer to the undropped set.
        let mut report = RejectionReport::new();
        for (e, row) in mask.rows().into_iter().enumerate() {
            let blamed: Vec<String> = row
                .iter()
                .enumerate()
                .filter(|(_, &b)| b)
                .map(|(c, _)| trials.ch_names[c].clone())
                .collect();
            if !blamed.is_empty() {
                report.insert(e, blamed);
            }
        }

        let kept = trials.drop(&report.rejected_indices());
        log::info!("custom rejection: {} of {n_total} trials dropped", report.len());
        Ok(Rejection { trials: kept, report, n_total, missing_labels })
    }
}

impl TrialRejector for BuiltinRejector {
    fn reject(&self, signal: &Signal, events: &[EventMarker], vocabulary: &EventVocabulary, labels: &[String], window: &EpochWindow) -> Result<Rejection> {
        let (present, missing_labels) = resolve_labels(vocabulary, labels);
        let refs: Vec<&str> = present.iter().map(String::as_str).collect();
        let selected = select_events(events, vocabulary, &refs);

        let (start, stop) = window_offsets(window, signal.sfreq);
        let total = signal.n_times() as i64;
        let n_t = (stop - start + 1).max(0) as usize;
        let in_bounds: Vec<(usize, EventMarker)> = selected
            .iter()
            .enumerate()
            .filter(|(_, ev)| {
                let first = ev.sample as i64 + start;
                first >= 0 && ev.sample as i64 + stop < total
            })
            .map(|(i, ev)| (i, *ev))
            .collect();
        let n_total = in_bounds.len();

        let mut report = RejectionReport::new();
        let mut survivors: Vec<(usize, EventMarker)> = Vec::with_capacity(n_total);
        for (trial, &(event_idx, ev)) in in_bounds.iter().enumerate() {
            let first = (ev.sample as i64 + start) as usize;
            let seg = signal.data.slice(s![.., first..first + n_t]);
            let blamed: Vec<String> = seg
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(_, row)| {
                    let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
                    let ptp = hi - lo;
                    ptp > self.thresholds.max || ptp < self.thresholds.flat
                })
                .map(|(c, _)| signal.ch_names[c].clone())
                .collect();
            if blamed.is_empty() {
                survivors.push((event_idx, ev));
            } else {
                report.insert(trial, blamed);
            }
        }

        let markers: Vec<EventMarker> = survivors.iter().map(|s| s.1).collect();
        let mut trials = epoch_events(signal, &markers, vocabulary, window)?;
        trials.selection = survivors.iter().map(|s| s.0).collect();
        log::info!("builtin rejection: {} of {n_total} trials dropped", report.len());
        Ok(Rejection { trials, report, n_total, missing_labels })
    }
}
