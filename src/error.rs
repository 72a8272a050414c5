//! Stage-level error taxonomy.
//!
//! Pure transforms return [`Result<T>`]; orchestration wraps these in
//! `anyhow` with the subject and stage attached.
use thiserror::Error;

/// Failure raised by a preprocessing, rejection or scoring stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Neither designated mastoid is present, so no reference exists.
    #[error("no reference channel available (looked for {0:?})")]
    NoReferenceChannel(Vec<String>),

    /// A channel named by configuration is not in the channel list.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// Tensor shapes or channel/time axes disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Condition-key patterns that matched no condition label.
    #[error("missing condition keys {0:?}; check condition names")]
    MissingConditionKeys(Vec<String>),

    /// Two reward-level patterns resolved to the same condition label.
    #[error("condition keys {first} and {second} both map to '{label}'")]
    DuplicateConditionKey {
        first:  String,
        second: String,
        label:  String,
    },

    /// Subject id has no entry in the subject table.
    #[error("subject '{0}' is not configured")]
    UnknownSubject(String),

    /// A numeric parameter is out of its valid domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Interpolation was requested but no sensor positions are attached.
    #[error("channel positions required for interpolation of {0:?}")]
    MissingChannelPositions(Vec<String>),

    /// An operation needs at least one trial.
    #[error("empty trial set: {0}")]
    EmptyTrialSet(String),

    /// Linear-algebra failure (e.g. SVD did not converge).
    #[error("linear algebra: {0}")]
    Linalg(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
