//! Continuous multi-channel recording.
//!
//! [`Signal`] owns its `[C, T]` buffer. Every conditioning stage takes a
//! `&Signal` and hands back a new one, so a caller's recording is never
//! modified behind its back.
use std::collections::BTreeSet;

use ndarray::{Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::events::Annotation;

/// A continuous recording in volts.
#[derive(Debug, Clone)]
pub struct Signal {
    /// `[C, T]` samples.
    pub data: Array2<f64>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    /// Channel names, one per row of `data`.
    pub ch_names: Vec<String>,
    /// Channels marked bad (kept in `data`, awaiting interpolation).
    pub bads: BTreeSet<String>,
    /// Optional sensor positions `[C, 3]` in metres (head coordinates).
    pub chan_pos: Option<Array2<f64>>,
    /// Discrete annotation stream, onsets in seconds.
    pub annotations: Vec<Annotation>,
}

impl Signal {
    /// Build a signal, checking that channel names match the row count and
    /// the sampling rate is positive.
    pub fn new(data: Array2<f64>, sfreq: f64, ch_names: Vec<String>) -> Result<Self> {
        if !(sfreq > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "sampling rate must be > 0, got {sfreq}"
            )));
        }
        if ch_names.len() != data.nrows() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} channel names for {} rows",
                ch_names.len(),
                data.nrows()
            )));
        }
        Ok(Self {
            data,
            sfreq,
            ch_names,
            bads: BTreeSet::new(),
            chan_pos: None,
            annotations: Vec::new(),
        })
    }

    /// Attach sensor positions (`[C, 3]`).
    pub fn with_positions(mut self, chan_pos: Array2<f64>) -> Result<Self> {
        if chan_pos.dim() != (self.n_channels(), 3) {
            return Err(PipelineError::ShapeMismatch(format!(
                "positions {:?} for {} channels",
                chan_pos.dim(),
                self.n_channels()
            )));
        }
        self.chan_pos = Some(chan_pos);
        Ok(self)
    }

    /// Attach an annotation stream.
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    /// Row index of a channel, if present.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channel_index(name).is_some()
    }

    /// Row index of a channel or an [`PipelineError::UnknownChannel`].
    pub fn require_channel(&self, name: &str) -> Result<usize> {
        self.channel_index(name)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))
    }

    /// New signal without the named channels. Unknown names are ignored.
    /// Dropped names also leave the bads set.
    pub fn drop_channels(&self, names: &[String]) -> Signal {
        let keep: Vec<usize> = (0..self.n_channels())
            .filter(|&i| !names.contains(&self.ch_names[i]))
            .collect();
        self.pick_indices(&keep)
    }

    /// New signal restricted to the given row indices, in that order.
    pub fn pick_indices(&self, idx: &[usize]) -> Signal {
        let data = self.data.select(Axis(0), idx);
        let ch_names: Vec<String> = idx.iter().map(|&i| self.ch_names[i].clone()).collect();
        let chan_pos = self.chan_pos.as_ref().map(|p| p.select(Axis(0), idx));
        let bads = self
            .bads
            .iter()
            .filter(|b| ch_names.contains(b))
            .cloned()
            .collect();
        Signal {
            data,
            sfreq: self.sfreq,
            ch_names,
            bads,
            chan_pos,
            annotations: self.annotations.clone(),
        }
    }

    /// Indices of channels not marked bad.
    pub fn good_indices(&self) -> Vec<usize> {
        (0..self.n_channels())
            .filter(|&i| !self.bads.contains(&self.ch_names[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_name_count_mismatch() {
        let data = Array2::zeros((3, 10));
        assert!(Signal::new(data, 250.0, names(&["A", "B"])).is_err());
    }

    #[test]
    fn rejects_non_positive_rate() {
        let data = Array2::zeros((1, 10));
        assert!(Signal::new(data.clone(), 0.0, names(&["A"])).is_err());
        assert!(Signal::new(data, f64::NAN, names(&["A"])).is_err());
    }

    #[test]
    fn drop_channels_keeps_order_and_bads() {
        let data = Array2::from_shape_fn((3, 4), |(c, _)| c as f64);
        let mut sig = Signal::new(data, 100.0, names(&["A", "B", "C"])).unwrap();
        sig.bads.insert("B".into());
        sig.bads.insert("C".into());
        let out = sig.drop_channels(&names(&["B"]));
        assert_eq!(out.ch_names, names(&["A", "C"]));
        assert_eq!(out.data[[1, 0]], 2.0);
        assert!(out.bads.contains("C"));
        assert!(!out.bads.contains("B"));
        // Input untouched.
        assert_eq!(sig.n_channels(), 3);
    }
}
