//! Bad-channel nomination from rejection logs.
//!
//! A channel's rate is the number of rejected trials that blame it divided
//! by the trial count *before* rejection. Channels with a rate above the
//! threshold are nominated for interpolation; nothing is removed here.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::rejection::RejectionReport;

/// Blame statistics for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelRate {
    pub drop_count: usize,
    pub total_trials: usize,
    pub rate: f64,
}

/// Per-channel blame statistics over one rejection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelQualityStats {
    pub channels: BTreeMap<String, ChannelRate>,
    pub total_trials: usize,
}

impl ChannelQualityStats {
    /// Count, for every channel in `ch_names`, how many reports blame it.
    ///
    /// With `total_trials == 0` every rate is 0.
    pub fn from_report(report: &RejectionReport, ch_names: &[String], total_trials: usize) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, blamed) in report.iter() {
            for ch in blamed {
                *counts.entry(ch.as_str()).or_insert(0) += 1;
            }
        }
        let channels = ch_names
            .iter()
            .map(|ch| {
                let drop_count = counts.get(ch.as_str()).copied().unwrap_or(0);
                let rate = if total_trials > 0 { drop_count as f64 / total_trials as f64 } else { 0.0 };
                (ch.clone(), ChannelRate { drop_count, total_trials, rate })
            })
            .collect();
        Self { channels, total_trials }
    }

    pub fn rate(&self, ch: &str) -> Option<f64> {
        self.channels.get(ch).map(|r| r.rate)
    }

    /// Channels whose rate strictly exceeds `threshold`.
    pub fn bad_channels(&self, threshold: f64) -> BTreeSet<String> {
        self.channels
            .iter()
            .filter(|(_, r)| r.rate > threshold)
            .map(|(ch, _)| ch.clone())
            .collect()
    }

    /// Log one summary line per channel.
    pub fn log_summary(&self, threshold: f64) {
        log::info!("--- channel rejection summary ---");
        for (ch, r) in &self.channels {
            log::info!("{ch}: {}/{} drops ({:.1}%)", r.drop_count, r.total_trials, r.rate * 100.0);
        }
        log::info!(
            "channels exceeding {:.0}% threshold: {:?}",
            threshold * 100.0,
            self.bad_channels(threshold)
        );
    }
}

/// Nominate bad channels from `report`.
pub fn analyze(report: &RejectionReport, ch_names: &[String], total_trials: usize, threshold: f64) -> (ChannelQualityStats, BTreeSet<String>) {
    let stats = ChannelQualityStats::from_report(report, ch_names, total_trials);
    stats.log_summary(threshold);
    let bad = stats.bad_channels(threshold);
    (stats, bad)
}
