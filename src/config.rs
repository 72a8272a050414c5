//! Pipeline configuration.
//!
//! Two named profiles exist, [`PipelineProfile::original`] and
//! [`PipelineProfile::proposed`]; they differ in decomposition method,
//! trial-rejection strategy, thresholds, and trimming. Signal-conditioning
//! parameters shared by both live in [`ConditioningConfig`].
//!
//! All fields are `pub` so a profile can be tweaked with struct-update
//! syntax:
//!
//! ```
//! use rewp::config::PipelineProfile;
//!
//! let profile = PipelineProfile {
//!     proportiontocut: 0.1,
//!     ..PipelineProfile::proposed()
//! };
//! assert_eq!(profile.bad_channel_rate, 0.2);
//! ```
use serde::{Deserialize, Serialize};

use crate::ica::{ComponentExclusion, ExclusionPolicy};

/// Four artifact thresholds, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactThresholds {
    /// Peak-to-peak range limit.
    pub max_min: f64,
    /// Absolute amplitude limit.
    pub level: f64,
    /// Positive sample-to-sample jump limit.
    pub step: f64,
    /// Flatline floor: every |x| below this marks a dead channel.
    pub lowest: f64,
}

impl ArtifactThresholds {
    /// Thresholds for the long decomposition-fitting window.
    pub fn ica() -> Self {
        Self { max_min: 500e-6, level: 500e-6, step: 40e-6, lowest: 0.1e-6 }
    }

    /// Thresholds for the final ERP window.
    pub fn erp() -> Self {
        Self { max_min: 150e-6, level: 150e-6, step: 40e-6, lowest: 0.1e-6 }
    }
}

impl Default for ArtifactThresholds {
    fn default() -> Self {
        Self::ica()
    }
}

/// Peak-to-peak bounds for the library-style rejector, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuiltinThresholds {
    /// Reject when peak-to-peak exceeds this.
    pub max: f64,
    /// Reject when peak-to-peak falls below this (flat channel).
    pub flat: f64,
}

impl BuiltinThresholds {
    pub fn ica() -> Self {
        Self { max: 500e-6, flat: 0.1e-6 }
    }

    pub fn erp() -> Self {
        Self { max: 150e-6, flat: 0.1e-6 }
    }
}

/// Trial window around each marker, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochWindow {
    pub tmin: f64,
    pub tmax: f64,
    /// `(bmin, bmax)`; `None` on either side means the window edge.
    pub baseline: Option<(Option<f64>, Option<f64>)>,
}

impl EpochWindow {
    /// `0 … 3 s`, no baseline.
    pub fn ica() -> Self {
        Self { tmin: 0.0, tmax: 3.0, baseline: None }
    }

    /// `−0.2 … 0.6 s`, baseline `−0.2 … 0 s`.
    pub fn erp() -> Self {
        Self { tmin: -0.2, tmax: 0.6, baseline: Some((Some(-0.2), Some(0.0))) }
    }
}

/// Which trial-rejection strategy a profile uses, with its two threshold
/// sets (decomposition window, ERP window).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RejectionConfig {
    Custom { ica: ArtifactThresholds, erp: ArtifactThresholds },
    Builtin { ica: BuiltinThresholds, erp: BuiltinThresholds },
}

/// Decomposition algorithm requested from the external solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcaMethod {
    Infomax,
    Picard,
}

/// Line-noise removal method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LineNoiseMethod {
    /// FIR band-stop at the mains frequency.
    Notch,
    /// Least-squares subtraction of mains harmonics.
    SpectralSubtraction,
}

/// Parameters of the signal-conditioning chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditioningConfig {
    /// Zero-valued channel inserted before anything else (recording reference).
    ///
    /// Default: `"Fz"`.
    pub added_reference: Option<String>,

    /// Target sampling rate in Hz.
    ///
    /// Default: `250.0` Hz.
    pub target_sfreq: f64,

    /// Band-pass edges `(f_low, f_high)` in Hz.
    ///
    /// Default: `(0.1, 30.0)` Hz.
    pub bandpass: (f64, f64),

    /// Mains frequency in Hz.
    ///
    /// Default: `50.0` Hz.
    pub line_freq: f64,

    pub line_noise: LineNoiseMethod,

    /// The two channels averaged for re-referencing.
    ///
    /// Default: `("TP9", "TP10")`.
    pub mastoids: (String, String),

    /// Mark dropped channels bad and interpolate them instead of removing
    /// them permanently.
    ///
    /// Default: `true`.
    pub interpolate: bool,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            added_reference: Some("Fz".into()),
            target_sfreq: 250.0,
            bandpass: (0.1, 30.0),
            line_freq: 50.0,
            line_noise: LineNoiseMethod::Notch,
            mastoids: ("TP9".into(), "TP10".into()),
            interpolate: true,
        }
    }
}

/// Named pipeline profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    Original,
    Proposed,
}

impl ProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Original => "original",
            ProfileName::Proposed => "proposed",
        }
    }
}

impl std::fmt::Display for ProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that differs between pipeline variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProfile {
    pub name: ProfileName,
    pub ica_method: IcaMethod,
    /// Seed handed to the decomposition solver.
    pub ica_seed: u64,
    pub rejection: RejectionConfig,
    /// Window used to cut trials for fitting the decomposition.
    pub ica_window: EpochWindow,
    /// Window used for the ERP trials.
    pub erp_window: EpochWindow,
    /// A channel blamed for more than this share of trials is nominated bad.
    pub bad_channel_rate: f64,
    /// Trials dropped at the start of every task block.
    pub early_trial_deletion: usize,
    /// Fraction cut from each tail in the trimmed mean.
    pub proportiontocut: f64,
    pub component_exclusion: ComponentExclusion,
    /// Chronological bins for the learning-effect analysis.
    pub n_bins: usize,
}

impl PipelineProfile {
    /// Infomax, custom four-criterion rejection, plain mean.
    pub fn original() -> Self {
        Self {
            name: ProfileName::Original,
            ica_method: IcaMethod::Infomax,
            ica_seed: 97,
            rejection: RejectionConfig::Custom {
                ica: ArtifactThresholds::ica(),
                erp: ArtifactThresholds::erp(),
            },
            ica_window: EpochWindow::ica(),
            erp_window: EpochWindow::erp(),
            bad_channel_rate: 0.2,
            early_trial_deletion: 10,
            proportiontocut: 0.0,
            component_exclusion: ComponentExclusion::Labeled(ExclusionPolicy::EyeBlinkAbove {
                confidence: 0.8,
            }),
            n_bins: 5,
        }
    }

    /// Picard, builtin peak-to-peak/flat rejection, 5 % trimmed mean.
    pub fn proposed() -> Self {
        Self {
            name: ProfileName::Proposed,
            ica_method: IcaMethod::Picard,
            rejection: RejectionConfig::Builtin {
                ica: BuiltinThresholds::ica(),
                erp: BuiltinThresholds::erp(),
            },
            proportiontocut: 0.05,
            component_exclusion: ComponentExclusion::Manual,
            ..Self::original()
        }
    }

    pub fn by_name(name: ProfileName) -> Self {
        match name {
            ProfileName::Original => Self::original(),
            ProfileName::Proposed => Self::proposed(),
        }
    }
}
