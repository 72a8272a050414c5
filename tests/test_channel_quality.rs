mod common;
use common::names;
use rewp::{channel_quality::analyze, ChannelQualityStats, RejectionReport};

/// 100 trials; Fp1 blamed in 25, T7 in 10 of those and 5 of its own.
fn report() -> RejectionReport {
    let mut r = RejectionReport::new();
    for trial in 0..25 {
        let blamed = if trial < 10 { names(&["Fp1", "T7"]) } else { names(&["Fp1"]) };
        r.insert(trial * 4, blamed);
    }
    for trial in [1, 5, 9, 13, 17] {
        r.insert(trial, names(&["T7"]));
    }
    r
}

#[test]
fn quarter_rate_crosses_twenty_percent() {
    let ch = names(&["Fp1", "T7", "Cz"]);
    let (stats, bad) = analyze(&report(), &ch, 100, 0.2);
    approx::assert_abs_diff_eq!(stats.rate("Fp1").unwrap(), 0.25, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(stats.rate("T7").unwrap(), 0.15, epsilon = 1e-12);
    assert_eq!(stats.rate("Cz"), Some(0.0));
    assert_eq!(bad.into_iter().collect::<Vec<_>>(), names(&["Fp1"]));
}

#[test]
fn quarter_rate_stays_under_thirty_percent() {
    let ch = names(&["Fp1", "T7", "Cz"]);
    let (_, bad) = analyze(&report(), &ch, 100, 0.3);
    assert!(bad.is_empty());
}

#[test]
fn threshold_is_strict() {
    let ch = names(&["Fp1", "T7", "Cz"]);
    let stats = ChannelQualityStats::from_report(&report(), &ch, 100);
    assert!(stats.bad_channels(0.25).is_empty());
    assert_eq!(stats.channels["Fp1"].drop_count, 25);
    assert_eq!(stats.total_trials, 100);
}

#[test]
fn zero_trials_give_zero_rates() {
    let ch = names(&["Fp1"]);
    let stats = ChannelQualityStats::from_report(&RejectionReport::new(), &ch, 0);
    assert_eq!(stats.rate("Fp1"), Some(0.0));
    assert!(stats.bad_channels(0.0).is_empty());
}
