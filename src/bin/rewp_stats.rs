use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use rewp::{
    stats::{run_parametric, run_robustness, Alternative, PermStat, RobustnessSettings},
    RewpScores, SubjectTable,
};

#[derive(Parser)]
#[command(name = "rewp_stats", about = "Group statistics on RewP scores")]
struct Args {
    /// Scores CSV written by `preproc`
    #[arg(long)]
    scores: PathBuf,

    /// Output directory for the result tables
    #[arg(long)]
    out_dir: PathBuf,

    /// Only learners (`true`) or only non-learners (`false`)
    #[arg(long)]
    learner: Option<bool>,

    /// Subject table JSON used for `--learner` (default: built-in table)
    #[arg(long)]
    subject_table: Option<PathBuf>,

    #[arg(long, default_value_t = 10_000)]
    n_perm: usize,

    #[arg(long, default_value_t = 10_000)]
    n_boot: usize,

    /// Seed for ML−LL; MH−HH uses seed + 1
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = PermStat::T)]
    stat: PermStat,

    #[arg(long, value_enum, default_value_t = Alternative::TwoSided)]
    alternative: Alternative,

    /// Bootstrap confidence level
    #[arg(long, default_value_t = 0.95)]
    ci: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (mut scores, meta) = RewpScores::load(&args.scores)?;
    if let Some(meta) = &meta {
        log::info!("scores at {} over {}–{} s", meta.ch_name, meta.tmin, meta.tmax);
    }
    let tag = match args.learner {
        Some(learner) => {
            let table = match &args.subject_table {
                Some(path) => SubjectTable::from_json_file(path)?,
                None => SubjectTable::builtin(),
            };
            scores = scores.restrict(&table.with_learner(learner));
            if learner { "learners" } else { "non_learners" }
        }
        None => "all",
    };
    if scores.n_subjects() == 0 {
        bail!("no subjects left after group selection");
    }
    log::info!("{} subjects ({tag})", scores.n_subjects());

    let parametric = run_parametric(&scores)?;
    let written = parametric.save(&args.out_dir.join(format!("rewp_parametric_{tag}.csv")))?;
    log::info!("written → {}", written.display());

    let settings = RobustnessSettings {
        n_perm: args.n_perm,
        n_boot: args.n_boot,
        seed: args.seed,
        stat: args.stat,
        alternative: args.alternative,
        ci: args.ci,
    };
    let robust = run_robustness(&scores, &settings)?;
    let written = robust.save(&args.out_dir.join(format!("rewp_robustness_{tag}.csv")))?;
    log::info!("written → {}", written.display());
    Ok(())
}
