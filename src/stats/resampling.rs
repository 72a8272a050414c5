//! Seeded sign-flip permutation test and percentile bootstrap for paired
//! designs.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{mean, nanquantile, paired_diffs, std_dev};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    #[default]
    TwoSided,
    /// `x1 > x2`
    Greater,
    /// `x1 < x2`
    Less,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PermStat {
    /// One-sample t of the differences.
    #[default]
    T,
    Mean,
}

impl PermStat {
    pub fn as_str(self) -> &'static str {
        match self {
            PermStat::T => "t",
            PermStat::Mean => "mean",
        }
    }

    fn of(self, d: &[f64]) -> f64 {
        match self {
            PermStat::T => mean(d) / (std_dev(d) / (d.len() as f64).sqrt()),
            PermStat::Mean => mean(d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermutationResult {
    pub n: usize,
    pub stat_obs: f64,
    pub p_perm: f64,
    pub stat: PermStat,
    pub alternative: Alternative,
    pub n_perm: usize,
    /// Null distribution; not written to the report files.
    #[serde(skip)]
    pub perm_stats: Vec<f64>,
}

/// Sign-flip permutation test on `x1 - x2` (NaN pairs omitted).
///
/// `p = (#{as extreme} + 1) / (n_perm + 1)`. Fewer than 3 pairs gives NaN.
pub fn paired_permutation_test(
    x1: &[f64],
    x2: &[f64],
    n_perm: usize,
    stat: PermStat,
    seed: u64,
    alternative: Alternative,
) -> PermutationResult {
    let diff = paired_diffs(x1, x2);
    let n = diff.len();
    if n < 3 {
        return PermutationResult {
            n,
            stat_obs: f64::NAN,
            p_perm: f64::NAN,
            stat,
            alternative,
            n_perm,
            perm_stats: Vec::new(),
        };
    }

    let stat_obs = stat.of(&diff);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut flipped = vec![0.0; n];
    let perm_stats: Vec<f64> = (0..n_perm)
        .map(|_| {
            for (f, &d) in flipped.iter_mut().zip(&diff) {
                *f = if rng.random_bool(0.5) { d } else { -d };
            }
            stat.of(&flipped)
        })
        .collect();

    let extreme = perm_stats
        .iter()
        .filter(|&&s| match alternative {
            Alternative::TwoSided => s.abs() >= stat_obs.abs(),
            Alternative::Greater => s >= stat_obs,
            Alternative::Less => s <= stat_obs,
        })
        .count();
    let p_perm = (extreme + 1) as f64 / (n_perm + 1) as f64;

    PermutationResult { n, stat_obs, p_perm, stat, alternative, n_perm, perm_stats }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub n: usize,
    pub mean_diff: f64,
    pub d: f64,
    pub ci_mean: (f64, f64),
    pub ci_d: (f64, f64),
    pub n_boot: usize,
    pub ci: f64,
}

/// Percentile bootstrap of the mean paired difference and of paired
/// Cohen's d, resampling subjects with replacement.
///
/// Fewer than 3 pairs gives NaN. `ci` must lie in `(0, 1)`.
pub fn paired_bootstrap_ci(x1: &[f64], x2: &[f64], n_boot: usize, seed: u64, ci: f64) -> Result<BootstrapResult> {
    if !(ci > 0.0 && ci < 1.0) {
        return Err(PipelineError::InvalidParameter(format!("confidence level {ci} outside (0, 1)")));
    }
    let diff = paired_diffs(x1, x2);
    let n = diff.len();
    if n < 3 {
        return Ok(BootstrapResult {
            n,
            mean_diff: f64::NAN,
            d: f64::NAN,
            ci_mean: (f64::NAN, f64::NAN),
            ci_d: (f64::NAN, f64::NAN),
            n_boot,
            ci,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sample = vec![0.0; n];
    let mut boot_mean = Vec::with_capacity(n_boot);
    let mut boot_d = Vec::with_capacity(n_boot);
    for _ in 0..n_boot {
        for s in sample.iter_mut() {
            *s = diff[rng.random_range(0..n)];
        }
        let m = mean(&sample);
        let sd = std_dev(&sample);
        boot_mean.push(m);
        boot_d.push(if sd > 0.0 { m / sd } else { f64::NAN });
    }

    let lo = (1.0 - ci) / 2.0;
    let hi = 1.0 - lo;
    let mean_diff = mean(&diff);
    let sd = std_dev(&diff);
    Ok(BootstrapResult {
        n,
        mean_diff,
        d: if sd > 0.0 { mean_diff / sd } else { f64::NAN },
        ci_mean: (nanquantile(&boot_mean, lo), nanquantile(&boot_mean, hi)),
        ci_d: (nanquantile(&boot_d, lo), nanquantile(&boot_d, hi)),
        n_boot,
        ci,
    })
}
