use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use rewp::{
    io::{read_ica_model, read_recording},
    pipeline::{run_batch, IcaBackend, PipelineContext, SubjectInput},
    scores::save_binned_scores,
    ConditionSet, ConditioningConfig, LineNoiseMethod, PipelineProfile, ProfileName, ScoreMeta, SubjectId,
    SubjectTable,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Group {
    All,
    Learners,
    NonLearners,
}

#[derive(Parser)]
#[command(name = "preproc", about = "RewP preprocessing: recordings → per-subject scores")]
struct Args {
    /// Directory holding `sub-XXX.safetensors` recordings
    #[arg(long)]
    input_dir: PathBuf,

    /// Scores CSV output path (a `<stem>_meta.json` is written next to it)
    #[arg(long)]
    output: PathBuf,

    /// Binned scores CSV output path
    #[arg(long)]
    binned_output: Option<PathBuf>,

    /// Pipeline profile
    #[arg(long, value_enum, default_value_t = ProfileName::Proposed)]
    profile: ProfileName,

    /// Subject table JSON (default: built-in table)
    #[arg(long)]
    subject_table: Option<PathBuf>,

    /// Subjects to run, comma-separated (default: every configured subject)
    #[arg(long, value_delimiter = ',')]
    subjects: Vec<SubjectId>,

    /// Restrict to a learner group
    #[arg(long, value_enum, default_value_t = Group::All)]
    group: Group,

    /// Directory holding `sub-XXX_ica.safetensors` decompositions
    #[arg(long)]
    ica_dir: Option<PathBuf>,

    /// Line-noise removal method
    #[arg(long, value_enum, default_value_t = LineNoiseMethod::Notch)]
    line_noise: LineNoiseMethod,

    /// Remove bad channels instead of interpolating them
    #[arg(long)]
    no_interpolate: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let table = match &args.subject_table {
        Some(path) => SubjectTable::from_json_file(path)?,
        None => SubjectTable::builtin(),
    };
    let mut subjects: Vec<SubjectId> = if args.subjects.is_empty() { table.ids().collect() } else { args.subjects.clone() };
    match args.group {
        Group::All => {}
        Group::Learners => {
            let keep = table.with_learner(true);
            subjects.retain(|s| keep.contains(s));
        }
        Group::NonLearners => {
            let keep = table.with_learner(false);
            subjects.retain(|s| keep.contains(s));
        }
    }
    if subjects.is_empty() {
        bail!("no subjects selected");
    }

    let profile = PipelineProfile::by_name(args.profile);
    let conditioning = ConditioningConfig {
        line_noise: args.line_noise,
        interpolate: !args.no_interpolate,
        ..Default::default()
    };
    let conditions = ConditionSet::default();
    let meta = ScoreMeta::default();
    let ctx = PipelineContext {
        subjects: &table,
        profile: &profile,
        conditioning: &conditioning,
        conditions: &conditions,
        ica: IcaBackend::default(),
        meta: meta.clone(),
    };

    let load = |id: SubjectId| -> Result<SubjectInput> {
        let recording = read_recording(&args.input_dir.join(format!("sub-{:03}.safetensors", id.0)))?;
        let ica_model = match &args.ica_dir {
            Some(dir) => Some(read_ica_model(&dir.join(format!("sub-{:03}_ica.safetensors", id.0)))?),
            None => None,
        };
        Ok(SubjectInput { recording, ica_model })
    };

    let outcome = run_batch(&subjects, load, &ctx);
    for (id, reason) in &outcome.failed {
        log::warn!("subject {id} skipped: {reason}");
    }
    if outcome.completed.is_empty() {
        bail!("every subject failed");
    }

    let scores = outcome.scores();
    scores.log_summary();
    let written = scores.save(&args.output, &meta)?;
    log::info!("written → {}", written.display());

    if let Some(path) = &args.binned_output {
        let written = save_binned_scores(&outcome.binned_scores(), path)?;
        log::info!("written → {}", written.display());
    }
    Ok(())
}
