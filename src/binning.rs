//! Chronological binning for the learning-effect analysis.
//!
//! Inside each reward family the trials keep their chronological order and
//! are cut into `n_bins` contiguous groups at `floor(i · n / n_bins)`. Bin
//! `i` of every family is then concatenated, families in
//! [`Family::ORDER`](crate::conditions::Family::ORDER).
use std::collections::BTreeMap;

use crate::conditions::Family;
use crate::epoch::TrialSet;
use crate::error::{PipelineError, Result};

/// `n_bins + 1` evenly spaced integer cut points over `[0, n]`.
pub fn cut_points(n: usize, n_bins: usize) -> Vec<usize> {
    (0..=n_bins).map(|i| i * n / n_bins).collect()
}

/// Bins keyed from 1. A bin with no trials in any family is left out.
pub fn bin_trials(trials: &TrialSet, families: &[(Family, Vec<String>)], n_bins: usize) -> Result<BTreeMap<usize, TrialSet>> {
    if n_bins == 0 {
        return Err(PipelineError::InvalidParameter("bin count must be > 0".into()));
    }
    let mut parts: BTreeMap<usize, Vec<TrialSet>> = BTreeMap::new();
    for (family, markers) in families {
        let group = trials.select_labels(markers);
        let cuts = cut_points(group.n_trials(), n_bins);
        log::debug!("{family:?}: {} trials, cut points {cuts:?}", group.n_trials());
        for (i, w) in cuts.windows(2).enumerate() {
            let part = group.slice(w[0], w[1]);
            if !part.is_empty() {
                parts.entry(i + 1).or_default().push(part);
            }
        }
    }

    let mut out = BTreeMap::new();
    for bin in 1..=n_bins {
        match parts.get(&bin) {
            Some(sets) => {
                out.insert(bin, TrialSet::concatenate(sets)?);
            }
            None => log::warn!("bin {bin} has no trials"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_trials_in_four_bins() {
        assert_eq!(cut_points(20, 4), vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn uneven_counts_follow_floor() {
        assert_eq!(cut_points(7, 3), vec![0, 2, 4, 7]);
        assert_eq!(cut_points(2, 4), vec![0, 0, 1, 1, 2]);
        assert_eq!(cut_points(0, 4), vec![0, 0, 0, 0, 0]);
    }
}
