//! Independent-component artifact removal.
//!
//! The decomposition solver and the component classifier are external
//! collaborators, seen only through [`IcaSolver`] and [`ComponentLabeler`].
//! This module owns what happens around them: the fitted model, the
//! exclusion policies over classifier output, and the back-projection that
//! removes excluded components from a recording.
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::IcaMethod;
use crate::epoch::TrialSet;
use crate::error::{PipelineError, Result};
use crate::signal::Signal;

/// Fitted linear decomposition `X ≈ A · S`, `S = W · X`.
#[derive(Debug, Clone, PartialEq)]
pub struct IcaModel {
    /// `A`, `[C, K]`.
    pub mixing: Array2<f64>,
    /// `W`, `[K, C]`.
    pub unmixing: Array2<f64>,
    /// Channels the model was fitted on, one per row of `mixing`.
    pub ch_names: Vec<String>,
}

impl IcaModel {
    pub fn new(mixing: Array2<f64>, unmixing: Array2<f64>, ch_names: Vec<String>) -> Result<Self> {
        let (c, k) = mixing.dim();
        if unmixing.dim() != (k, c) || ch_names.len() != c {
            return Err(PipelineError::ShapeMismatch(format!(
                "mixing {:?}, unmixing {:?}, {} channel names",
                mixing.dim(),
                unmixing.dim(),
                ch_names.len()
            )));
        }
        Ok(Self { mixing, unmixing, ch_names })
    }

    pub fn n_components(&self) -> usize {
        self.mixing.ncols()
    }

    fn rows_in(&self, signal: &Signal) -> Result<Vec<usize>> {
        self.ch_names.iter().map(|ch| signal.require_channel(ch)).collect()
    }

    /// Component activations `[K, T]`.
    pub fn sources(&self, signal: &Signal) -> Result<Array2<f64>> {
        let idx = self.rows_in(signal)?;
        Ok(self.unmixing.dot(&signal.data.select(Axis(0), &idx)))
    }

    /// Remove the `exclude`d components: `X − A[:, ex] · (W[ex, :] · X)` on
    /// the model channels. Other channels pass through.
    pub fn apply(&self, signal: &Signal, exclude: &[usize]) -> Result<Signal> {
        if let Some(&bad) = exclude.iter().find(|&&k| k >= self.n_components()) {
            return Err(PipelineError::InvalidParameter(format!(
                "component {bad} out of range ({} components)",
                self.n_components()
            )));
        }
        if exclude.is_empty() {
            return Ok(signal.clone());
        }
        let idx = self.rows_in(signal)?;
        let x = signal.data.select(Axis(0), &idx);
        let s_ex = self.unmixing.select(Axis(0), exclude).dot(&x);
        let artefact = self.mixing.select(Axis(1), exclude).dot(&s_ex);

        let mut out = signal.clone();
        for (r, &i) in idx.iter().enumerate() {
            let mut row = out.data.row_mut(i);
            row -= &artefact.row(r);
        }
        log::info!("removed {} independent components {exclude:?}", exclude.len());
        Ok(out)
    }
}

/// Fits a decomposition on trials. Seeds are always explicit.
pub trait IcaSolver {
    fn fit(&self, trials: &TrialSet, method: IcaMethod, seed: u64) -> Result<IcaModel>;
}

/// Classifies fitted components.
pub trait ComponentLabeler {
    fn label(&self, model: &IcaModel, trials: &TrialSet) -> Result<Vec<ComponentProbabilities>>;
}

/// The eight component classes, in classifier output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    Brain,
    Muscle,
    EyeBlink,
    EyeMovement,
    Heart,
    LineNoise,
    ChannelNoise,
    Other,
}

impl ComponentClass {
    pub const ALL: [ComponentClass; 8] = [
        ComponentClass::Brain,
        ComponentClass::Muscle,
        ComponentClass::EyeBlink,
        ComponentClass::EyeMovement,
        ComponentClass::Heart,
        ComponentClass::LineNoise,
        ComponentClass::ChannelNoise,
        ComponentClass::Other,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentClass::Brain => "brain",
            ComponentClass::Muscle => "muscle artifact",
            ComponentClass::EyeBlink => "eye blink",
            ComponentClass::EyeMovement => "eye movement",
            ComponentClass::Heart => "heart beat",
            ComponentClass::LineNoise => "line noise",
            ComponentClass::ChannelNoise => "channel noise",
            ComponentClass::Other => "other",
        }
    }
}

/// Probability vector over [`ComponentClass::ALL`] for one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentProbabilities(pub [f64; 8]);

impl ComponentProbabilities {
    pub fn get(&self, class: ComponentClass) -> f64 {
        self.0[class.index()]
    }

    /// Most probable class and its probability (first wins on ties).
    pub fn predicted(&self) -> (ComponentClass, f64) {
        let mut best = 0;
        for i in 1..8 {
            if self.0[i] > self.0[best] {
                best = i;
            }
        }
        (ComponentClass::ALL[best], self.0[best])
    }
}

/// How classifier output turns into excluded components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Predicted class is eye blink with probability above `confidence`.
    EyeBlinkAbove { confidence: f64 },
    /// `P(eye blink) > P(brain)`.
    EyeBlinkOverBrain,
    /// `P(brain) < threshold`.
    BrainBelow { threshold: f64 },
}

impl ExclusionPolicy {
    pub fn select(&self, labels: &[ComponentProbabilities]) -> Vec<usize> {
        labels
            .iter()
            .enumerate()
            .filter(|(_, p)| match *self {
                ExclusionPolicy::EyeBlinkAbove { confidence } => {
                    let (class, prob) = p.predicted();
                    class == ComponentClass::EyeBlink && prob > confidence
                }
                ExclusionPolicy::EyeBlinkOverBrain => {
                    p.get(ComponentClass::EyeBlink) > p.get(ComponentClass::Brain)
                }
                ExclusionPolicy::BrainBelow { threshold } => p.get(ComponentClass::Brain) < threshold,
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Where a profile's excluded components come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "policy", rename_all = "snake_case")]
pub enum ComponentExclusion {
    /// Keep every component.
    None,
    /// Per-subject lists from the subject table.
    Manual,
    /// Classifier output filtered by a policy.
    Labeled(ExclusionPolicy),
}

impl ComponentExclusion {
    /// Resolve the excluded indices. `Labeled` without classifier output
    /// excludes nothing.
    pub fn resolve(&self, manual: &[usize], labels: Option<&[ComponentProbabilities]>) -> Vec<usize> {
        match self {
            ComponentExclusion::None => Vec::new(),
            ComponentExclusion::Manual => manual.to_vec(),
            ComponentExclusion::Labeled(policy) => match labels {
                Some(l) => policy.select(l),
                None => {
                    log::warn!("no component labels available, nothing excluded");
                    Vec::new()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(brain: f64, blink: f64) -> ComponentProbabilities {
        let rest = (1.0 - brain - blink) / 6.0;
        let mut p = [rest; 8];
        p[ComponentClass::Brain.index()] = brain;
        p[ComponentClass::EyeBlink.index()] = blink;
        ComponentProbabilities(p)
    }

    #[test]
    fn policies_differ_as_documented() {
        let labels = vec![probs(0.9, 0.05), probs(0.1, 0.85), probs(0.3, 0.35), probs(0.35, 0.3)];
        assert_eq!(ExclusionPolicy::EyeBlinkAbove { confidence: 0.8 }.select(&labels), vec![1]);
        assert_eq!(ExclusionPolicy::EyeBlinkOverBrain.select(&labels), vec![1, 2]);
        assert_eq!(ExclusionPolicy::BrainBelow { threshold: 0.4 }.select(&labels), vec![1, 2, 3]);
    }

    #[test]
    fn exclusion_sources() {
        let labels = vec![probs(0.1, 0.85)];
        assert!(ComponentExclusion::None.resolve(&[1, 2], Some(&labels)).is_empty());
        assert_eq!(ComponentExclusion::Manual.resolve(&[1, 2], None), vec![1, 2]);
        let lab = ComponentExclusion::Labeled(ExclusionPolicy::EyeBlinkOverBrain);
        assert_eq!(lab.resolve(&[], Some(&labels)), vec![0]);
        assert!(lab.resolve(&[], None).is_empty());
    }

    #[test]
    fn apply_removes_excluded_source() {
        // Two sources mixed into two channels with an identity model plus a
        // third channel outside the model.
        let data = Array2::from_shape_fn((3, 8), |(c, t)| (c * 10 + t) as f64);
        let sig = Signal::new(data, 10.0, vec!["A".into(), "B".into(), "C".into()]).unwrap();
        let model = IcaModel::new(Array2::eye(2), Array2::eye(2), vec!["B".into(), "A".into()]).unwrap();
        let out = model.apply(&sig, &[0]).unwrap();
        assert!(out.data.row(1).iter().all(|&v| v == 0.0));
        assert_eq!(out.data.row(0), sig.data.row(0));
        assert_eq!(out.data.row(2), sig.data.row(2));
        assert_eq!(model.sources(&sig).unwrap().row(0), sig.data.row(1));
    }

    #[test]
    fn model_shape_checked() {
        assert!(IcaModel::new(Array2::zeros((3, 2)), Array2::zeros((3, 2)), vec!["A".into(); 3]).is_err());
        let m = IcaModel::new(Array2::eye(1), Array2::eye(1), vec!["A".into()]).unwrap();
        let sig = Signal::new(Array2::zeros((1, 4)), 1.0, vec!["A".into()]).unwrap();
        assert!(m.apply(&sig, &[3]).is_err());
    }

    #[test]
    fn exclusion_serializes() {
        let json = serde_json::to_string(&ComponentExclusion::Labeled(ExclusionPolicy::BrainBelow { threshold: 0.4 })).unwrap();
        let back: ComponentExclusion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ComponentExclusion::Labeled(ExclusionPolicy::BrainBelow { threshold: 0.4 }));
    }
}
