//! Annotation stream → integer event markers.
//!
//! Codes follow MNE's `events_from_annotations(event_id='auto')`: the unique
//! descriptions are sorted and numbered from 1, so the label ↔ code mapping
//! is a bijection fixed by the vocabulary alone.
use std::collections::BTreeMap;

use crate::signal::Signal;

/// One entry of the annotation stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Onset in seconds from the first sample.
    pub onset_secs: f64,
    pub description: String,
}

impl Annotation {
    pub fn new(onset_secs: f64, description: impl Into<String>) -> Self {
        Self { onset_secs, description: description.into() }
    }
}

/// `(sample_index, code)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMarker {
    pub sample: usize,
    pub code: i32,
}

/// Bijective label ↔ code mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventVocabulary {
    by_label: BTreeMap<String, i32>,
    by_code:  BTreeMap<i32, String>,
}

impl EventVocabulary {
    /// Number the sorted unique descriptions 1, 2, …
    pub fn from_annotations(annotations: &[Annotation]) -> Self {
        let mut labels: Vec<&str> = annotations.iter().map(|a| a.description.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        let mut vocab = Self::default();
        for (i, label) in labels.into_iter().enumerate() {
            let code = i as i32 + 1;
            vocab.by_label.insert(label.to_string(), code);
            vocab.by_code.insert(code, label.to_string());
        }
        vocab
    }

    pub fn code(&self, label: &str) -> Option<i32> {
        self.by_label.get(label).copied()
    }

    pub fn label(&self, code: i32) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.by_label.keys().map(String::as_str)
    }

    /// Split `requested` into labels present in the vocabulary and labels
    /// that are absent. Order of `requested` is preserved in both lists.
    pub fn partition<'a>(&self, requested: &'a [String]) -> (Vec<&'a str>, Vec<&'a str>) {
        requested
            .iter()
            .map(String::as_str)
            .partition(|l| self.by_label.contains_key(*l))
    }
}

/// Convert the annotation stream to markers in chronological order.
///
/// `sample = round(onset_secs · sfreq)`; markers with equal samples keep
/// their annotation order.
pub fn events_from_annotations(signal: &Signal) -> (Vec<EventMarker>, EventVocabulary) {
    let vocab = EventVocabulary::from_annotations(&signal.annotations);
    let mut events: Vec<EventMarker> = signal
        .annotations
        .iter()
        .filter(|a| a.onset_secs >= 0.0)
        .filter_map(|a| {
            let code = vocab.code(&a.description)?;
            let sample = (a.onset_secs * signal.sfreq).round() as usize;
            Some(EventMarker { sample, code })
        })
        .collect();
    events.sort_by_key(|e| e.sample);
    (events, vocab)
}

/// Drop the first `n` trials of every task block.
///
/// A trial starts at a task-start annotation and runs up to (not including)
/// the next task start of *any* block. Labels grouped in one block share a
/// counter. Returns the new signal and the number of annotations removed.
pub fn exclude_early_trials(signal: &Signal, task_blocks: &[Vec<String>], n: usize) -> (Signal, usize) {
    let block_of = |desc: &str| task_blocks.iter().position(|b| b.iter().any(|l| l == desc));

    let mut order: Vec<usize> = (0..signal.annotations.len()).collect();
    order.sort_by(|&a, &b| {
        signal.annotations[a]
            .onset_secs
            .total_cmp(&signal.annotations[b].onset_secs)
    });

    let mut counts = vec![0usize; task_blocks.len()];
    let mut excluded = vec![false; signal.annotations.len()];
    let mut i = 0;
    while i < order.len() {
        let desc = &signal.annotations[order[i]].description;
        if let Some(b) = block_of(desc) {
            if counts[b] < n {
                excluded[order[i]] = true;
                let mut j = i + 1;
                while j < order.len() && block_of(&signal.annotations[order[j]].description).is_none() {
                    excluded[order[j]] = true;
                    j += 1;
                }
            }
            counts[b] += 1;
        }
        i += 1;
    }

    let annotations: Vec<Annotation> = order
        .iter()
        .filter(|&&k| !excluded[k])
        .map(|&k| signal.annotations[k].clone())
        .collect();
    let n_excluded = excluded.iter().filter(|&&e| e).count();
    log::info!("excluded {n_excluded} events (first {n} trials of each block)");

    let mut out = signal.clone();
    out.annotations = annotations;
    (out, n_excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sig(annotations: Vec<Annotation>) -> Signal {
        Signal::new(Array2::zeros((1, 10_000)), 100.0, vec!["Cz".into()])
            .unwrap()
            .with_annotations(annotations)
    }

    #[test]
    fn vocabulary_is_sorted_and_bijective() {
        let ann = vec![
            Annotation::new(0.0, "b"),
            Annotation::new(1.0, "a"),
            Annotation::new(2.0, "b"),
        ];
        let v = EventVocabulary::from_annotations(&ann);
        assert_eq!(v.len(), 2);
        assert_eq!(v.code("a"), Some(1));
        assert_eq!(v.code("b"), Some(2));
        assert_eq!(v.label(2), Some("b"));
    }

    #[test]
    fn markers_use_rounded_samples() {
        let s = sig(vec![Annotation::new(0.504, "x"), Annotation::new(0.1, "y")]);
        let (ev, vocab) = events_from_annotations(&s);
        assert_eq!(ev[0], EventMarker { sample: 10, code: vocab.code("y").unwrap() });
        assert_eq!(ev[1].sample, 50);
    }

    #[test]
    fn partition_reports_missing() {
        let v = EventVocabulary::from_annotations(&[Annotation::new(0.0, "a")]);
        let req = vec!["a".to_string(), "z".to_string()];
        let (present, missing) = v.partition(&req);
        assert_eq!(present, vec!["a"]);
        assert_eq!(missing, vec!["z"]);
    }

    #[test]
    fn early_trials_removed_per_block() {
        let blocks = vec![vec!["S1".to_string()], vec!["S11".to_string(), "S21".to_string()]];
        let ann = vec![
            Annotation::new(1.0, "S1"),
            Annotation::new(1.5, "fb"),
            Annotation::new(2.0, "S1"),
            Annotation::new(2.5, "fb"),
            Annotation::new(3.0, "S11"),
            Annotation::new(3.5, "fb"),
            Annotation::new(4.0, "S21"),
            Annotation::new(4.5, "fb"),
        ];
        let (out, n) = exclude_early_trials(&sig(ann), &blocks, 1);
        // First S1 trial and first trial of the shared S11/S21 block go.
        assert_eq!(n, 4);
        let kept: Vec<f64> = out.annotations.iter().map(|a| a.onset_secs).collect();
        assert_eq!(kept, vec![2.0, 2.5, 4.0, 4.5]);
    }
}
