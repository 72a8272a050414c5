//! Four-criterion artifact detection over `[E, C, T]` trial tensors.
//!
//! Each (trial, channel) segment is checked independently:
//!
//! | criterion | fires when                                 |
//! |-----------|--------------------------------------------|
//! | MaxMin    | `max(x) − min(x) > max_min`                |
//! | Level     | `max(|x|) > level`                         |
//! | Step      | `x[t+1] − x[t] > step` for some `t`        |
//! | Lowest    | `|x[t]| < lowest` for every `t`            |
//!
//! The step check is signed: only upward jumps count. A downward jump of the
//! same size is not flagged. All comparisons are strict.
use ndarray::{Array2, ArrayView1, ArrayView3};

use crate::config::ArtifactThresholds;

/// Which criteria fired for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactFlags {
    pub max_min: bool,
    pub level:   bool,
    pub step:    bool,
    pub lowest:  bool,
}

impl ArtifactFlags {
    #[inline]
    pub fn any(&self) -> bool {
        self.max_min || self.level || self.step || self.lowest
    }
}

/// Evaluate all four criteria on a single channel segment.
///
/// An empty segment counts as flat.
pub fn check_segment(x: ArrayView1<f64>, th: &ArtifactThresholds) -> ArtifactFlags {
    let mut hi = f64::NEG_INFINITY;
    let mut lo = f64::INFINITY;
    let mut abs_max = f64::NEG_INFINITY;
    let mut all_below = true;
    let mut step = false;
    let mut prev: Option<f64> = None;

    for &v in x.iter() {
        hi = hi.max(v);
        lo = lo.min(v);
        abs_max = abs_max.max(v.abs());
        if !(v.abs() < th.lowest) {
            all_below = false;
        }
        if let Some(p) = prev {
            if v - p > th.step {
                step = true;
            }
        }
        prev = Some(v);
    }

    if x.is_empty() {
        return ArtifactFlags { lowest: true, ..ArtifactFlags::default() };
    }

    ArtifactFlags {
        max_min: (hi - lo).abs() > th.max_min,
        level:   abs_max > th.level,
        step,
        lowest:  all_below,
    }
}

/// Boolean mask `[E, C]`: `true` where any criterion fires.
pub fn detect(trials: ArrayView3<f64>, th: &ArtifactThresholds) -> Array2<bool> {
    let (n_e, n_c, _) = trials.dim();
    Array2::from_shape_fn((n_e, n_c), |(e, c)| {
        check_segment(trials.slice(ndarray::s![e, c, ..]), th).any()
    })
}

/// Trial-level mask: a trial is an artifact if any channel fires.
pub fn trial_mask(mask: &Array2<bool>) -> Vec<bool> {
    mask.rows().into_iter().map(|r| r.iter().any(|&b| b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn th() -> ArtifactThresholds {
        ArtifactThresholds { max_min: 100.0, level: 80.0, step: 30.0, lowest: 0.5 }
    }

    #[test]
    fn clean_segment_passes() {
        let x = Array1::from(vec![1.0, 5.0, -3.0, 10.0, 2.0]);
        assert!(!check_segment(x.view(), &th()).any());
    }

    #[test]
    fn max_min_boundary_is_strict() {
        // Range exactly 100 → not flagged; level/step kept out of the way.
        let wide = ArtifactThresholds { level: 1e9, step: 1e9, ..th() };
        let x = Array1::from(vec![-50.0, 0.0, 50.0]);
        assert!(!check_segment(x.view(), &wide).max_min);
        let x = Array1::from(vec![-50.0, 0.0, 51.0]);
        assert!(check_segment(x.view(), &wide).max_min);
    }

    #[test]
    fn level_boundary_is_strict() {
        let x = Array1::from(vec![0.0, -80.0]);
        assert!(!check_segment(x.view(), &th()).level);
        let x = Array1::from(vec![0.0, -81.0]);
        assert!(check_segment(x.view(), &th()).level);
    }

    #[test]
    fn step_is_signed() {
        let loose = ArtifactThresholds { max_min: 1e9, level: 1e9, ..th() };
        let up = Array1::from(vec![0.0, 40.0]);
        let down = Array1::from(vec![40.0, 0.0]);
        assert!(check_segment(up.view(), &loose).step);
        assert!(!check_segment(down.view(), &loose).step);
        // Exactly the threshold is not a step.
        let eq = Array1::from(vec![0.0, 30.0]);
        assert!(!check_segment(eq.view(), &loose).step);
    }

    #[test]
    fn flatline_flagged_regardless_of_other_thresholds() {
        let strict = ArtifactThresholds { max_min: 1e9, level: 1e9, step: 1e9, lowest: 0.5 };
        let x = Array1::from(vec![0.1, -0.2, 0.0, 0.49]);
        let f = check_segment(x.view(), &strict);
        assert!(f.lowest && f.any());
        // One sample at the floor breaks the flatline.
        let x = Array1::from(vec![0.1, 0.5]);
        assert!(!check_segment(x.view(), &strict).lowest);
    }

    #[test]
    fn mask_shape_and_channel_independence() {
        let mut t = Array3::<f64>::from_elem((3, 4, 6), 2.0);
        t[[1, 2, 3]] = 500.0;
        let m = detect(t.view(), &th());
        assert_eq!(m.dim(), (3, 4));
        assert_eq!(m.iter().filter(|&&b| b).count(), 1);
        assert!(m[[1, 2]]);

        // Reordering channels reorders the mask identically.
        let perm = [3usize, 2, 1, 0];
        let t2 = t.select(ndarray::Axis(1), &perm);
        let m2 = detect(t2.view(), &th());
        for e in 0..3 {
            for (new_c, &old_c) in perm.iter().enumerate() {
                assert_eq!(m2[[e, new_c]], m[[e, old_c]]);
            }
        }
        assert_eq!(trial_mask(&m), vec![false, true, false]);
    }
}
