//! Per-subject orchestration and batch driver.
//!
//! A subject runs through:
//!
//! 1. conditioning stages 1–5 ([`conditioning::condition`]),
//! 2. decomposition trials at the onset-locked labels, rejected with the
//!    profile's ICA-stage thresholds,
//! 3. component removal (precomputed model, or solver + optional labeler),
//! 4. interpolation of channels marked bad,
//! 5. early-trial removal per task block,
//! 6. ERP-window rejection and channel-quality analysis; newly nominated
//!    channels are marked bad, interpolated and the rejection re-run once,
//! 7. per-condition evokeds, the RewP score row and the binned rows.
//!
//! [`run_batch`] keeps going past failed subjects and records why.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use ndarray::Array2;

use crate::binning::bin_trials;
use crate::channel_quality::{analyze, ChannelQualityStats};
use crate::conditioning::{self, drop_bad_channels, interpolate_marked};
use crate::conditions::ConditionSet;
use crate::config::{ConditioningConfig, PipelineProfile};
use crate::erp::{evokeds_by_condition, Evoked};
use crate::events::{events_from_annotations, exclude_early_trials};
use crate::ica::{ComponentLabeler, IcaModel, IcaSolver};
use crate::io::Recording;
use crate::rejection::{Rejection, Stage};
use crate::scores::{score_row, BinnedScore, ConditionKeyMap, RewpScores, ScoreMeta};
use crate::signal::Signal;
use crate::subjects::{SubjectId, SubjectTable};

/// Where independent components come from.
#[derive(Default, Clone, Copy)]
pub struct IcaBackend<'a> {
    /// Decomposition fitted elsewhere; used as is.
    pub model: Option<&'a IcaModel>,
    /// Fits a decomposition when no model is given.
    pub solver: Option<&'a dyn IcaSolver>,
    pub labeler: Option<&'a dyn ComponentLabeler>,
}

/// Everything shared by the subjects of one run.
pub struct PipelineContext<'a> {
    pub subjects: &'a SubjectTable,
    pub profile: &'a PipelineProfile,
    pub conditioning: &'a ConditioningConfig,
    pub conditions: &'a ConditionSet,
    pub ica: IcaBackend<'a>,
    pub meta: ScoreMeta,
}

impl PipelineContext<'_> {
    /// Reward-level mapping over the configured condition names.
    pub fn key_map(&self) -> crate::Result<ConditionKeyMap> {
        let names = self.conditions.condition_names();
        let keys: Vec<&str> = names.iter().map(String::as_str).collect();
        ConditionKeyMap::resolve(&keys)
    }
}

/// Outcome of one subject.
#[derive(Debug, Clone)]
pub struct SubjectResult {
    pub subject: SubjectId,
    pub evokeds: BTreeMap<String, Evoked>,
    /// `[LL, ML, MH, HH]` in µV.
    pub scores: [f64; 4],
    /// Score rows per chronological bin, keyed from 1.
    pub binned: BTreeMap<usize, [f64; 4]>,
    pub excluded_components: Vec<usize>,
    pub early_annotations_removed: usize,
    /// ERP trials before and after the final rejection pass.
    pub n_trials_total: usize,
    pub n_trials_kept: usize,
    /// Channels nominated by the channel-quality stage.
    pub nominated_bad: BTreeSet<String>,
    /// Blame rates of the pass that nominated `nominated_bad`.
    pub channel_stats: ChannelQualityStats,
    /// Blame rates of the final pass, the one the evokeds are built from.
    /// Equal to `channel_stats` when nothing was nominated.
    pub final_channel_stats: ChannelQualityStats,
}

/// Remove artifact components. Returns the cleaned signal, or the input
/// unchanged with a warning when no decomposition is configured.
fn remove_components(
    signal: &Signal,
    subject: SubjectId,
    ctx: &PipelineContext<'_>,
) -> Result<(Signal, Vec<usize>)> {
    let profile = ctx.profile;
    let good = signal.pick_indices(&signal.good_indices());
    let (events, vocab) = events_from_annotations(&good);
    let rejection = profile
        .rejection
        .rejector(Stage::Ica)
        .reject(&good, &events, &vocab, &ctx.conditions.onset_locked, &profile.ica_window)
        .context("rejecting decomposition trials")?;
    log::info!(
        "subject {subject}: {} of {} decomposition trials kept",
        rejection.trials.n_trials(),
        rejection.n_total
    );

    let fitted;
    let model = match (ctx.ica.model, ctx.ica.solver) {
        (Some(m), _) => m,
        (None, Some(solver)) => {
            fitted = solver
                .fit(&rejection.trials, profile.ica_method, profile.ica_seed)
                .context("fitting decomposition")?;
            &fitted
        }
        (None, None) => {
            log::warn!("subject {subject}: no decomposition configured, components not removed");
            return Ok((signal.clone(), Vec::new()));
        }
    };

    let labels = match ctx.ica.labeler {
        Some(l) => Some(l.label(model, &rejection.trials).context("labelling components")?),
        None => None,
    };
    let manual = ctx.subjects.get(subject)?.ic_excluded.for_profile(profile.name);
    let exclude = profile.component_exclusion.resolve(manual, labels.as_deref());
    let cleaned = model.apply(signal, &exclude).context("removing components")?;
    Ok((cleaned, exclude))
}

fn erp_rejection(signal: &Signal, ctx: &PipelineContext<'_>) -> Result<Rejection> {
    let (events, vocab) = events_from_annotations(signal);
    let labels = ctx.conditions.feedback_markers();
    let rejection = ctx
        .profile
        .rejection
        .rejector(Stage::Erp)
        .reject(signal, &events, &vocab, &labels, &ctx.profile.erp_window)?;
    Ok(rejection)
}

/// Run one subject end to end.
pub fn run_subject(rec: &Recording, subject: SubjectId, ctx: &PipelineContext<'_>) -> Result<SubjectResult> {
    let info = ctx.subjects.get(subject)?;
    let profile = ctx.profile;
    log::info!("subject {subject}: profile {}", profile.name);

    let conditioned = conditioning::condition(&rec.signal, ctx.conditioning, &info.bad_channels, rec.ref_pos)
        .with_context(|| format!("subject {subject}: conditioning"))?;

    let (cleaned, excluded_components) =
        remove_components(&conditioned, subject, ctx).with_context(|| format!("subject {subject}: decomposition"))?;
    let interpolated = interpolate_marked(&cleaned).with_context(|| format!("subject {subject}: interpolation"))?;

    let (trimmed, early_annotations_removed) =
        exclude_early_trials(&interpolated, &ctx.conditions.task_blocks, profile.early_trial_deletion);
    log::info!("subject {subject}: {early_annotations_removed} early annotations removed");

    let mut signal = trimmed;
    let mut rejection = erp_rejection(&signal, ctx).with_context(|| format!("subject {subject}: ERP rejection"))?;
    let (channel_stats, nominated_bad) =
        analyze(&rejection.report, &signal.ch_names, rejection.n_total, profile.bad_channel_rate);
    let mut final_channel_stats = channel_stats.clone();
    if !nominated_bad.is_empty() {
        log::info!("subject {subject}: channels {nominated_bad:?} nominated bad, re-running rejection");
        let names: Vec<String> = nominated_bad.iter().cloned().collect();
        signal = drop_bad_channels(&signal, &names, ctx.conditioning.interpolate);
        signal = interpolate_marked(&signal).with_context(|| format!("subject {subject}: re-interpolation"))?;
        rejection = erp_rejection(&signal, ctx).with_context(|| format!("subject {subject}: ERP rejection"))?;
        final_channel_stats = ChannelQualityStats::from_report(&rejection.report, &signal.ch_names, rejection.n_total);
    }

    let evokeds = evokeds_by_condition(&rejection.trials, ctx.conditions, profile.proportiontocut)
        .with_context(|| format!("subject {subject}: averaging"))?;

    let key_map = ctx.key_map()?;
    let scores = score_row(&evokeds, &key_map, &ctx.meta).with_context(|| format!("subject {subject}: scoring"))?;

    let mut binned = BTreeMap::new();
    for (bin, trials) in bin_trials(&rejection.trials, &ctx.conditions.families(), profile.n_bins)? {
        let bin_evokeds = evokeds_by_condition(&trials, ctx.conditions, profile.proportiontocut)?;
        binned.insert(bin, score_row(&bin_evokeds, &key_map, &ctx.meta)?);
    }

    Ok(SubjectResult {
        subject,
        evokeds,
        scores,
        binned,
        excluded_components,
        early_annotations_removed,
        n_trials_total: rejection.n_total,
        n_trials_kept: rejection.trials.n_trials(),
        nominated_bad,
        channel_stats,
        final_channel_stats,
    })
}

/// Completed subjects and the ones that failed, with the error chain.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<SubjectResult>,
    pub failed: Vec<(SubjectId, String)>,
    pub key_map: Option<ConditionKeyMap>,
}

impl BatchOutcome {
    /// Score matrix over the completed subjects, in completion order.
    pub fn scores(&self) -> RewpScores {
        let mut scores = Array2::from_elem((self.completed.len(), 4), f64::NAN);
        for (mut row, r) in scores.rows_mut().into_iter().zip(&self.completed) {
            row.assign(&ndarray::ArrayView1::from(&r.scores));
        }
        RewpScores {
            subjects: self.completed.iter().map(|r| r.subject).collect(),
            scores,
            key_map: self.key_map.clone(),
        }
    }

    pub fn binned_scores(&self) -> Vec<BinnedScore> {
        self.completed
            .iter()
            .flat_map(|r| r.binned.iter().map(|(&bin, &row)| BinnedScore::new(r.subject, bin, row)))
            .collect()
    }
}

/// What the loader hands over for one subject.
#[derive(Debug, Clone)]
pub struct SubjectInput {
    pub recording: Recording,
    /// Subject-specific decomposition; overrides the shared backend model.
    pub ica_model: Option<IcaModel>,
}

impl From<Recording> for SubjectInput {
    fn from(recording: Recording) -> Self {
        Self { recording, ica_model: None }
    }
}

fn run_input(input: &SubjectInput, subject: SubjectId, ctx: &PipelineContext<'_>) -> Result<SubjectResult> {
    match &input.ica_model {
        Some(model) => {
            let local = PipelineContext {
                ica: IcaBackend { model: Some(model), ..ctx.ica },
                meta: ctx.meta.clone(),
                ..*ctx
            };
            run_subject(&input.recording, subject, &local)
        }
        None => run_subject(&input.recording, subject, ctx),
    }
}

/// Run every subject; `load` supplies its input.
pub fn run_batch<F>(subjects: &[SubjectId], mut load: F, ctx: &PipelineContext<'_>) -> BatchOutcome
where
    F: FnMut(SubjectId) -> Result<SubjectInput>,
{
    let mut outcome = BatchOutcome { key_map: ctx.key_map().ok(), ..Default::default() };
    for &subject in subjects {
        match load(subject).and_then(|input| run_input(&input, subject, ctx)) {
            Ok(result) => outcome.completed.push(result),
            Err(e) => {
                log::error!("subject {subject} failed: {e:#}");
                outcome.failed.push((subject, format!("{e:#}")));
            }
        }
    }
    log::info!("{} subjects completed, {} failed", outcome.completed.len(), outcome.failed.len());
    outcome
}
