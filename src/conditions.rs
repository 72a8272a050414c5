//! Condition dictionary of the reward task.
//!
//! Task starts are onset-locked; outcomes are feedback-locked and labelled
//! `{Low-Low, Mid-Low, Mid-High, High-High} × {Win, Loss}`.
use serde::{Deserialize, Serialize};

/// Named condition and the marker labels that belong to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub markers: Vec<String>,
}

/// Coarse reward family used for chronological binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Low,
    Mid,
    High,
}

impl Family {
    /// Fixed concatenation order of families inside a bin.
    pub const ORDER: [Family; 3] = [Family::Low, Family::Mid, Family::High];

    /// Family of a condition name: exact `Low-Low Win/Loss`, any `Mid-`,
    /// any `High-High`.
    pub fn of(condition: &str) -> Option<Family> {
        if condition == "Low-Low Win" || condition == "Low-Low Loss" {
            Some(Family::Low)
        } else if condition.contains("Mid-") {
            Some(Family::Mid)
        } else if condition.contains("High-High") {
            Some(Family::High)
        } else {
            None
        }
    }
}

/// Full condition dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    /// Task-start labels the decomposition trials are locked to.
    pub onset_locked: Vec<String>,
    /// Task blocks for early-trial removal; labels in one block share a
    /// counter.
    pub task_blocks: Vec<Vec<String>>,
    /// Feedback conditions, in reporting order.
    pub feedback_locked: Vec<Condition>,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

impl Default for ConditionSet {
    fn default() -> Self {
        let feedback = [
            ("Low-Low Win", "Stimulus:S  6"),
            ("Low-Low Loss", "Stimulus:S  7"),
            ("Mid-Low Win", "Stimulus:S 16"),
            ("Mid-Low Loss", "Stimulus:S 17"),
            ("Mid-High Win", "Stimulus:S 26"),
            ("Mid-High Loss", "Stimulus:S 27"),
            ("High-High Win", "Stimulus:S 36"),
            ("High-High Loss", "Stimulus:S 37"),
        ];
        Self {
            onset_locked: strings(&["Stimulus:S  1", "Stimulus:S 11", "Stimulus:S 21", "Stimulus:S 31"]),
            task_blocks: vec![
                strings(&["Stimulus:S  1"]),
                strings(&["Stimulus:S 11", "Stimulus:S 21"]),
                strings(&["Stimulus:S 31"]),
            ],
            feedback_locked: feedback
                .iter()
                .map(|(name, marker)| Condition { name: name.to_string(), markers: vec![marker.to_string()] })
                .collect(),
        }
    }
}

impl ConditionSet {
    /// Every feedback marker label, condition order.
    pub fn feedback_markers(&self) -> Vec<String> {
        self.feedback_locked.iter().flat_map(|c| c.markers.iter().cloned()).collect()
    }

    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.feedback_locked.iter().find(|c| c.name == name)
    }

    pub fn condition_names(&self) -> Vec<String> {
        self.feedback_locked.iter().map(|c| c.name.clone()).collect()
    }

    /// Marker labels per family, in [`Family::ORDER`].
    pub fn families(&self) -> Vec<(Family, Vec<String>)> {
        Family::ORDER
            .iter()
            .map(|&fam| {
                let markers = self
                    .feedback_locked
                    .iter()
                    .filter(|c| Family::of(&c.name) == Some(fam))
                    .flat_map(|c| c.markers.iter().cloned())
                    .collect();
                (fam, markers)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_partition_feedback_markers() {
        let set = ConditionSet::default();
        let fam = set.families();
        assert_eq!(fam[0], (Family::Low, strings(&["Stimulus:S  6", "Stimulus:S  7"])));
        assert_eq!(fam[1].1.len(), 4);
        assert_eq!(fam[2].1, strings(&["Stimulus:S 36", "Stimulus:S 37"]));
        assert_eq!(set.feedback_markers().len(), 8);
    }

    #[test]
    fn family_matching_rules() {
        assert_eq!(Family::of("Mid-High Win"), Some(Family::Mid));
        assert_eq!(Family::of("High-High Loss"), Some(Family::High));
        assert_eq!(Family::of("Low-Low Win"), Some(Family::Low));
        assert_eq!(Family::of("Low-Low Draw"), None);
    }
}
