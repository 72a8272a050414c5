//! Per-subject static configuration.
//!
//! Lookups go through a validated [`SubjectId`] and fail with
//! [`PipelineError::UnknownSubject`] instead of defaulting to an empty
//! configuration.
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::ProfileName;
use crate::error::{PipelineError, Result};

/// Numeric subject identifier (`"27"`, `"sub-027"` and `27` are the same).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(pub u32);

impl FromStr for SubjectId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("sub-");
        digits
            .parse::<u32>()
            .map(SubjectId)
            .map_err(|_| PipelineError::UnknownSubject(s.to_string()))
    }
}

impl TryFrom<String> for SubjectId {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> String {
        id.to_string()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Excluded independent components per profile. `None` means the profile
/// has no manual list for this subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IcExcluded {
    pub original: Option<Vec<usize>>,
    pub proposed: Option<Vec<usize>>,
}

impl IcExcluded {
    pub fn for_profile(&self, name: ProfileName) -> &[usize] {
        let list = match name {
            ProfileName::Original => &self.original,
            ProfileName::Proposed => &self.proposed,
        };
        list.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    /// Whether the subject learned the task.
    pub learner: bool,
    /// Channels dropped before decomposition.
    pub bad_channels: Vec<String>,
    pub ic_excluded: IcExcluded,
}

/// `SubjectId → SubjectInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectTable(BTreeMap<SubjectId, SubjectInfo>);

impl SubjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SubjectId, info: SubjectInfo) {
        self.0.insert(id, info);
    }

    /// Configuration of `id`, or [`PipelineError::UnknownSubject`].
    pub fn get(&self, id: SubjectId) -> Result<&SubjectInfo> {
        self.0.get(&id).ok_or_else(|| PipelineError::UnknownSubject(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Subjects whose learner flag equals `learner`, id order.
    pub fn with_learner(&self, learner: bool) -> Vec<SubjectId> {
        self.0.iter().filter(|(_, i)| i.learner == learner).map(|(&id, _)| id).collect()
    }

    /// Read a table from JSON (`{"27": {"learner": true, ...}, ...}`).
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading subject table {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing subject table {}", path.display()))
    }

    /// Subjects 27–38 of the reward dataset.
    pub fn builtin() -> Self {
        let rows: [(u32, bool, &[usize]); 12] = [
            (27, true,  &[0, 1, 2, 4, 5, 6, 11, 12, 13, 14, 18, 25]),
            (28, true,  &[0, 1, 3, 4, 6, 11, 14, 19, 21, 23, 30]),
            (29, false, &[0, 1, 2, 8, 10, 11, 12, 14, 16, 18, 20, 21, 22, 25, 27]),
            (30, false, &[0, 2, 3, 5, 8, 12, 15, 17, 24, 27]),
            (31, true,  &[0, 1, 4, 5, 7, 15, 16, 19, 28, 29, 30]),
            (32, false, &[0, 1, 4, 5, 9, 11, 13, 14, 18, 20, 21, 24, 25, 26, 28]),
            (33, false, &[1, 2, 4, 5, 8, 9, 10, 11, 15, 17, 18, 20, 26]),
            (34, true,  &[0, 2, 3, 4, 8, 9, 10, 11, 12, 17, 19]),
            (35, true,  &[0, 1, 2, 3, 4, 5, 7, 8, 9, 10, 11, 12, 14, 15, 16, 17, 19, 25, 29, 30]),
            (36, true,  &[0, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13, 14, 19, 21, 23, 24, 29]),
            (37, true,  &[0, 3, 7, 8, 11, 12, 18, 20, 25, 27]),
            (38, true,  &[0, 5, 8, 9, 10, 12, 14, 21, 30]),
        ];
        let mut table = Self::new();
        for (id, learner, proposed) in rows {
            table.insert(
                SubjectId(id),
                SubjectInfo {
                    learner,
                    bad_channels: Vec::new(),
                    ic_excluded: IcExcluded { original: None, proposed: Some(proposed.to_vec()) },
                },
            );
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_leniently() {
        assert_eq!("27".parse::<SubjectId>().unwrap(), SubjectId(27));
        assert_eq!("sub-027".parse::<SubjectId>().unwrap(), SubjectId(27));
        assert!("abc".parse::<SubjectId>().is_err());
    }

    #[test]
    fn unknown_subject_fails_fast() {
        let table = SubjectTable::builtin();
        assert_eq!(table.len(), 12);
        assert!(matches!(table.get(SubjectId(5)), Err(PipelineError::UnknownSubject(_))));
        let info = table.get(SubjectId(29)).unwrap();
        assert!(!info.learner);
        assert!(info.ic_excluded.for_profile(ProfileName::Original).is_empty());
        assert_eq!(info.ic_excluded.for_profile(ProfileName::Proposed)[..3], [0, 1, 2]);
    }

    #[test]
    fn learner_groups() {
        let table = SubjectTable::builtin();
        assert_eq!(table.with_learner(false), vec![SubjectId(29), SubjectId(30), SubjectId(32), SubjectId(33)]);
        assert_eq!(table.with_learner(true).len(), 8);
    }

    #[test]
    fn json_round_trip() {
        let table = SubjectTable::builtin();
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.starts_with("{\"27\":"));
        let back: SubjectTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
