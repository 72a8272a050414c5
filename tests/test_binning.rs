mod common;
use common::{annotations, names, smooth, trials_at};
use rewp::{binning::bin_trials, ConditionSet, EpochWindow, Signal, TrialSet};

const WINDOW: EpochWindow = EpochWindow { tmin: 0.0, tmax: 0.2, baseline: None };

/// One trial per second at 10 Hz in the repeating pattern L M L M H.
fn twenty_trials() -> TrialSet {
    let low = ["Stimulus:S  6", "Stimulus:S  7"];
    let mid = ["Stimulus:S 16", "Stimulus:S 26", "Stimulus:S 17", "Stimulus:S 27"];
    let high = ["Stimulus:S 36", "Stimulus:S 37"];
    let (mut l, mut m, mut h) = (0, 0, 0);
    let mut labels = Vec::new();
    for i in 0..20 {
        let label = match i % 5 {
            0 | 2 => {
                l += 1;
                low[(l - 1) % 2]
            }
            1 | 3 => {
                m += 1;
                mid[(m - 1) % 4]
            }
            _ => {
                h += 1;
                high[(h - 1) % 2]
            }
        };
        labels.push(label);
    }
    let signal = Signal::new(smooth(2, 210), 10.0, names(&["FCz", "Cz"]))
        .unwrap()
        .with_annotations(annotations(&labels, 0.0, 1.0));
    trials_at(&signal, &WINDOW)
}

#[test]
fn four_bins_of_five_in_family_order() {
    let trials = twenty_trials();
    assert_eq!(trials.n_trials(), 20);
    let bins = bin_trials(&trials, &ConditionSet::default().families(), 4).unwrap();

    assert_eq!(bins.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    for set in bins.values() {
        assert_eq!(set.n_trials(), 5);
    }
    // Low first, then Mid, then High; chronological inside each family.
    assert_eq!(bins[&1].samples, vec![0, 20, 10, 30, 40]);
    assert_eq!(bins[&4].samples, vec![150, 170, 160, 180, 190]);
    assert_eq!(bins[&1].label(4), "Stimulus:S 36");
    assert_eq!(bins[&2].label(4), "Stimulus:S 37");
}

#[test]
fn sparse_family_leaves_empty_bins_out() {
    let trials = twenty_trials();
    let high_only: Vec<_> = ConditionSet::default()
        .families()
        .into_iter()
        .filter(|(fam, _)| *fam == rewp::Family::High)
        .collect();
    let bins = bin_trials(&trials, &high_only, 8).unwrap();
    // 4 trials, cut points 0 0 1 1 2 2 3 3 4.
    assert_eq!(bins.keys().copied().collect::<Vec<_>>(), vec![2, 4, 6, 8]);
    assert!(bins.values().all(|b| b.n_trials() == 1));
}

#[test]
fn zero_bins_is_rejected() {
    let trials = twenty_trials();
    assert!(bin_trials(&trials, &ConditionSet::default().families(), 0).is_err());
}
