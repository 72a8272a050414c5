//! # rewp: reward-positivity ERP pipeline
//!
//! `rewp` turns continuous EEG recordings of a reward-learning task into
//! per-subject reward-positivity (RewP) scores and group statistics. The
//! signal-processing steps follow [MNE-Python](https://mne.tools)
//! semantics.
//!
//! ## Pipeline overview
//!
//! ```text
//! <subject>.safetensors
//!   │
//!   ├─ io::read_recording()          data [C,T] + annotations + positions
//!   ├─ conditioning::condition()     add ref → resample → band-pass/notch
//!   │                                → bad channels → mastoid reference
//!   ├─ rejection (ICA window)        custom 4-criterion | builtin ptp/flat
//!   ├─ ica::IcaModel::apply()        remove excluded components
//!   ├─ conditioning::interpolate_marked()
//!   ├─ events::exclude_early_trials()
//!   ├─ rejection (ERP window)  ──→  channel_quality::analyze()
//!   ├─ erp::evokeds_by_condition()   trimmed mean per condition
//!   ├─ scores::score_row()           win − loss mean amplitude, FCz 240–340 ms
//!   └─ binning::bin_trials()         chronological bins per reward family
//!        │
//!        └─→ scores CSV ──→ stats::{run_parametric, run_robustness}
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use rewp::{io, pipeline, PipelineProfile, ProfileName, ConditioningConfig,
//!            ConditionSet, ScoreMeta, SubjectId, SubjectTable};
//! use std::path::Path;
//!
//! let table = SubjectTable::builtin();
//! let profile = PipelineProfile::by_name(ProfileName::Proposed);
//! let conditioning = ConditioningConfig::default();
//! let conditions = ConditionSet::default();
//! let ctx = pipeline::PipelineContext {
//!     subjects: &table,
//!     profile: &profile,
//!     conditioning: &conditioning,
//!     conditions: &conditions,
//!     ica: Default::default(),
//!     meta: ScoreMeta::default(),
//! };
//!
//! let rec = io::read_recording(Path::new("data/sub-027.safetensors")).unwrap();
//! let result = pipeline::run_subject(&rec, SubjectId(27), &ctx).unwrap();
//! println!("LL ML MH HH = {:?} µV", result.scores);
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use rewp::{artifact, erp, ArtifactThresholds};
//! use ndarray::Array3;
//!
//! let trials: Array3<f64> = Array3::zeros((40, 32, 301)); // [E, C, T]
//! let mask = artifact::detect(trials.view(), &ArtifactThresholds::erp());
//! let evoked = erp::trimmed_mean(trials.view(), 0.05).unwrap();
//! assert_eq!(mask.dim(), (40, 32));
//! assert_eq!(evoked.dim(), (32, 301));
//! ```
//!
//! The library logs through the `log` facade and installs no logger.

pub mod artifact;
pub mod binning;
pub mod channel_quality;
pub mod conditioning;
pub mod conditions;
pub mod config;
pub mod epoch;
pub mod erp;
pub mod error;
pub mod events;
pub mod filter;
pub mod ica;
pub mod interpolate;
pub mod io;
pub mod line_noise;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod rejection;
pub mod resample;
pub mod scores;
pub mod signal;
pub mod stats;
pub mod subjects;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// error
pub use error::{PipelineError, Result};

// config
pub use config::{
    ArtifactThresholds, BuiltinThresholds, ConditioningConfig, EpochWindow, IcaMethod, LineNoiseMethod,
    PipelineProfile, ProfileName, RejectionConfig,
};

// data model
pub use conditions::{Condition, ConditionSet, Family};
pub use epoch::TrialSet;
pub use erp::Evoked;
pub use events::{Annotation, EventMarker, EventVocabulary};
pub use signal::Signal;
pub use subjects::{IcExcluded, SubjectId, SubjectInfo, SubjectTable};

// trial quality control
pub use channel_quality::ChannelQualityStats;
pub use rejection::{BuiltinRejector, CustomRejector, Rejection, RejectionReport, Stage, TrialRejector};

// decomposition
pub use ica::{ComponentClass, ComponentExclusion, ComponentLabeler, ComponentProbabilities, ExclusionPolicy, IcaModel, IcaSolver};

// scores
pub use scores::{ConditionKeyMap, RewardLevel, RewpScores, ScoreMeta};

// orchestration
pub use pipeline::{run_batch, run_subject, BatchOutcome, IcaBackend, PipelineContext, SubjectInput, SubjectResult};
