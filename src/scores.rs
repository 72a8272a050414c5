//! RewP score matrix `(subject × [LL, ML, MH, HH])` and its CSV form.
//!
//! Condition names are mapped to reward levels by token counting, so
//! `"Mid-High Win"` satisfies `{mid, high, win}` but not `{high, high, win}`.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::erp::{mean_amplitude, Evoked, REWP_CHANNEL, REWP_WINDOW};
use crate::error::{PipelineError, Result};
use crate::subjects::SubjectId;

/// Reward level, in score-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewardLevel {
    LL,
    ML,
    MH,
    HH,
}

impl RewardLevel {
    pub const ALL: [RewardLevel; 4] = [RewardLevel::LL, RewardLevel::ML, RewardLevel::MH, RewardLevel::HH];

    pub fn as_str(self) -> &'static str {
        match self {
            RewardLevel::LL => "LL",
            RewardLevel::ML => "ML",
            RewardLevel::MH => "MH",
            RewardLevel::HH => "HH",
        }
    }

    fn tokens(self) -> [&'static str; 2] {
        match self {
            RewardLevel::LL => ["low", "low"],
            RewardLevel::ML => ["mid", "low"],
            RewardLevel::MH => ["mid", "high"],
            RewardLevel::HH => ["high", "high"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    fn token(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
        }
    }
}

fn pattern_name(level: RewardLevel, outcome: Outcome) -> String {
    format!("{}_{}", level.as_str(), outcome.token())
}

/// Lowercase alphanumeric tokens: `"Mid-High Win"` → `[mid, high, win]`.
fn tokenize(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// First key whose token counts cover `required`.
fn find_key<'a>(keys: &[&'a str], required: &[&str]) -> Option<&'a str> {
    let mut need: HashMap<&str, usize> = HashMap::new();
    for &r in required {
        *need.entry(r).or_insert(0) += 1;
    }
    keys.iter().copied().find(|k| {
        let toks = tokenize(k);
        need.iter().all(|(tok, &n)| toks.iter().filter(|t| t.as_str() == *tok).count() >= n)
    })
}

/// `"LL_win"` → condition name, for all eight patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionKeyMap(BTreeMap<String, String>);

impl ConditionKeyMap {
    /// Resolve every pattern against `keys`.
    ///
    /// Fails with [`PipelineError::MissingConditionKeys`] when a pattern
    /// matches nothing and with [`PipelineError::DuplicateConditionKey`]
    /// when two patterns land on the same condition.
    pub fn resolve(keys: &[&str]) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut missing = Vec::new();
        let mut seen: Vec<(String, String)> = Vec::new();
        for level in RewardLevel::ALL {
            for outcome in [Outcome::Win, Outcome::Loss] {
                let [a, b] = level.tokens();
                let name = pattern_name(level, outcome);
                match find_key(keys, &[a, b, outcome.token()]) {
                    Some(label) => {
                        if let Some((first, _)) = seen.iter().find(|(_, l)| l == label) {
                            return Err(PipelineError::DuplicateConditionKey {
                                first: first.clone(),
                                second: name,
                                label: label.to_string(),
                            });
                        }
                        seen.push((name.clone(), label.to_string()));
                        map.insert(name, label.to_string());
                    }
                    None => missing.push(name),
                }
            }
        }
        if !missing.is_empty() {
            return Err(PipelineError::MissingConditionKeys(missing));
        }
        Ok(Self(map))
    }

    pub fn get(&self, level: RewardLevel, outcome: Outcome) -> Option<&str> {
        self.0.get(&pattern_name(level, outcome)).map(String::as_str)
    }
}

/// Score matrix with its row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RewpScores {
    pub subjects: Vec<SubjectId>,
    /// `[n_subjects, 4]` in µV, columns [`RewardLevel::ALL`].
    pub scores: Array2<f64>,
    pub key_map: Option<ConditionKeyMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMeta {
    pub score_labels: Vec<String>,
    pub ch_name: String,
    pub tmin: f64,
    pub tmax: f64,
}

impl Default for ScoreMeta {
    fn default() -> Self {
        Self {
            score_labels: RewardLevel::ALL.iter().map(|l| l.as_str().to_string()).collect(),
            ch_name: REWP_CHANNEL.to_string(),
            tmin: REWP_WINDOW.0,
            tmax: REWP_WINDOW.1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    key_map: Option<ConditionKeyMap>,
    meta: ScoreMeta,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScoreRow {
    subject: u32,
    #[serde(rename = "LL")]
    ll: f64,
    #[serde(rename = "ML")]
    ml: f64,
    #[serde(rename = "MH")]
    mh: f64,
    #[serde(rename = "HH")]
    hh: f64,
}

/// Win − loss mean amplitude for each level; NaN where a condition is
/// missing.
pub fn score_row(evokeds: &BTreeMap<String, Evoked>, key_map: &ConditionKeyMap, meta: &ScoreMeta) -> Result<[f64; 4]> {
    let mut row = [f64::NAN; 4];
    for (slot, level) in row.iter_mut().zip(RewardLevel::ALL) {
        let ev = |o| key_map.get(level, o).and_then(|label| evokeds.get(label));
        match (ev(Outcome::Win), ev(Outcome::Loss)) {
            (Some(w), Some(l)) => {
                *slot = mean_amplitude(w, &meta.ch_name, meta.tmin, meta.tmax)?
                    - mean_amplitude(l, &meta.ch_name, meta.tmin, meta.tmax)?;
            }
            _ => log::warn!("{} has no win/loss pair, scored NaN", level.as_str()),
        }
    }
    Ok(row)
}

/// Build the group score matrix. The key map is resolved from the first
/// subject's condition names.
pub fn compute_rewp_scores(group: &BTreeMap<SubjectId, BTreeMap<String, Evoked>>, meta: &ScoreMeta) -> Result<RewpScores> {
    let first = group
        .values()
        .next()
        .ok_or_else(|| PipelineError::EmptyTrialSet("no subjects to score".into()))?;
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    let key_map = ConditionKeyMap::resolve(&keys)?;

    let mut scores = Array2::from_elem((group.len(), 4), f64::NAN);
    for (mut out, evokeds) in scores.rows_mut().into_iter().zip(group.values()) {
        let row = score_row(evokeds, &key_map, meta)?;
        out.assign(&ndarray::ArrayView1::from(&row));
    }
    let scores = RewpScores { subjects: group.keys().copied().collect(), scores, key_map: Some(key_map) };
    scores.log_summary();
    Ok(scores)
}

/// `<dir>/<stem>_<suffix>` next to `path`.
pub(crate) fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("scores");
    path.with_file_name(format!("{stem}_{suffix}"))
}

impl RewpScores {
    pub fn n_subjects(&self) -> usize {
        self.subjects.len()
    }

    /// Rows of the listed subjects, in the order given; unknown ids skipped.
    pub fn restrict(&self, ids: &[SubjectId]) -> RewpScores {
        let idx: Vec<usize> = ids.iter().filter_map(|id| self.subjects.iter().position(|s| s == id)).collect();
        RewpScores {
            subjects: idx.iter().map(|&i| self.subjects[i]).collect(),
            scores: self.scores.select(ndarray::Axis(0), &idx),
            key_map: self.key_map.clone(),
        }
    }

    pub fn log_summary(&self) {
        for (sid, row) in self.subjects.iter().zip(self.scores.rows()) {
            log::info!(
                "subject {sid}: LL {:.3} ML {:.3} MH {:.3} HH {:.3} µV",
                row[0],
                row[1],
                row[2],
                row[3]
            );
        }
    }

    /// Write `subject,LL,ML,MH,HH` plus `<stem>_meta.json`.
    pub fn save(&self, path: &Path, meta: &ScoreMeta) -> anyhow::Result<PathBuf> {
        let path = path.with_extension("csv");
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut w = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
        for (sid, row) in self.subjects.iter().zip(self.scores.rows()) {
            w.serialize(ScoreRow { subject: sid.0, ll: row[0], ml: row[1], mh: row[2], hh: row[3] })?;
        }
        w.flush()?;

        let meta_path = sidecar(&path, "meta.json");
        let payload = MetaFile { key_map: self.key_map.clone(), meta: meta.clone() };
        std::fs::write(&meta_path, serde_json::to_string_pretty(&payload)?)
            .with_context(|| format!("writing {}", meta_path.display()))?;
        log::info!("saved RewP scores -> {}", path.display());
        Ok(path)
    }

    /// Read a file written by [`RewpScores::save`]; the sidecar is optional.
    pub fn load(path: &Path) -> anyhow::Result<(RewpScores, Option<ScoreMeta>)> {
        let path = path.with_extension("csv");
        let mut r = csv::Reader::from_path(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut subjects = Vec::new();
        let mut flat = Vec::new();
        for row in r.deserialize::<ScoreRow>() {
            let row = row.with_context(|| format!("parsing {}", path.display()))?;
            subjects.push(SubjectId(row.subject));
            flat.extend([row.ll, row.ml, row.mh, row.hh]);
        }
        let scores = Array2::from_shape_vec((subjects.len(), 4), flat)?;

        let meta_path = sidecar(&path, "meta.json");
        let (key_map, meta) = if meta_path.exists() {
            let text = std::fs::read_to_string(&meta_path)?;
            let f: MetaFile = serde_json::from_str(&text).with_context(|| format!("parsing {}", meta_path.display()))?;
            (f.key_map, Some(f.meta))
        } else {
            (None, None)
        };
        Ok((RewpScores { subjects, scores, key_map }, meta))
    }
}

/// One subject's scores for one chronological bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedScore {
    pub subject: u32,
    pub bin: usize,
    #[serde(rename = "LL")]
    pub ll: f64,
    #[serde(rename = "ML")]
    pub ml: f64,
    #[serde(rename = "MH")]
    pub mh: f64,
    #[serde(rename = "HH")]
    pub hh: f64,
}

impl BinnedScore {
    pub fn new(subject: SubjectId, bin: usize, row: [f64; 4]) -> Self {
        let [ll, ml, mh, hh] = row;
        Self { subject: subject.0, bin, ll, ml, mh, hh }
    }
}

/// Write `subject,bin,LL,ML,MH,HH`.
pub fn save_binned_scores(rows: &[BinnedScore], path: &Path) -> anyhow::Result<PathBuf> {
    let path = path.with_extension("csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    log::info!("saved binned RewP scores -> {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 8] = [
        "Low-Low Win",
        "Low-Low Loss",
        "Mid-Low Win",
        "Mid-Low Loss",
        "Mid-High Win",
        "Mid-High Loss",
        "High-High Win",
        "High-High Loss",
    ];

    #[test]
    fn tokens_split_on_punctuation() {
        assert_eq!(tokenize("Mid-High Win"), vec!["mid", "high", "win"]);
    }

    #[test]
    fn key_map_resolves_every_pattern() {
        let km = ConditionKeyMap::resolve(&NAMES).unwrap();
        assert_eq!(km.get(RewardLevel::MH, Outcome::Win), Some("Mid-High Win"));
        assert_eq!(km.get(RewardLevel::HH, Outcome::Loss), Some("High-High Loss"));
        assert_eq!(km.get(RewardLevel::LL, Outcome::Win), Some("Low-Low Win"));
    }

    #[test]
    fn missing_patterns_are_listed() {
        let err = ConditionKeyMap::resolve(&NAMES[..6]).unwrap_err();
        match err {
            PipelineError::MissingConditionKeys(m) => assert_eq!(m, vec!["HH_win", "HH_loss"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_mapping_is_fatal() {
        // "High-Mid-High Win" satisfies both MH and HH.
        let names = [
            "Low-Low Win", "Low-Low Loss", "Mid-Low Win", "Mid-Low Loss",
            "High-Mid-High Win", "Mid-High Loss", "High-High Loss",
        ];
        assert!(matches!(
            ConditionKeyMap::resolve(&names),
            Err(PipelineError::DuplicateConditionKey { .. })
        ));
    }

    #[test]
    fn sidecar_name() {
        assert_eq!(sidecar(Path::new("out/rewp.csv"), "meta.json"), PathBuf::from("out/rewp_meta.json"));
    }
}
