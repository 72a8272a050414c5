use ndarray::Array2;
use rewp::{
    stats::{run_parametric, run_robustness, RobustnessSettings},
    ConditionKeyMap, RewpScores, ScoreMeta, SubjectId, SubjectTable,
};

const CONDITIONS: [&str; 8] = [
    "Low-Low Win",
    "Low-Low Loss",
    "Mid-Low Win",
    "Mid-Low Loss",
    "Mid-High Win",
    "Mid-High Loss",
    "High-High Win",
    "High-High Loss",
];

/// Builtin subjects 27–38; ML sits ~2 µV above LL and MH ~2 µV above HH.
fn group() -> RewpScores {
    let subjects: Vec<SubjectId> = (27..=38).map(SubjectId).collect();
    let scores = Array2::from_shape_fn((subjects.len(), 4), |(i, j)| {
        let base = 0.5 + 0.1 * i as f64;
        let wobble = 0.3 * ((i * 7 + j * 3) % 5) as f64 / 4.0;
        match j {
            0 | 3 => base + wobble,
            _ => base + 2.0 + wobble,
        }
    });
    RewpScores { subjects, scores, key_map: Some(ConditionKeyMap::resolve(&CONDITIONS).unwrap()) }
}

#[test]
fn scores_file_round_trips_with_nan_and_sidecar() {
    let mut scores = group();
    scores.scores[[3, 2]] = f64::NAN;
    let meta = ScoreMeta::default();

    let dir = tempfile::tempdir().unwrap();
    let path = scores.save(&dir.path().join("rewp_scores"), &meta).unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("csv"));
    assert!(dir.path().join("rewp_scores_meta.json").exists());

    let (back, back_meta) = RewpScores::load(&path).unwrap();
    assert_eq!(back.subjects, scores.subjects);
    assert_eq!(back.key_map, scores.key_map);
    assert_eq!(back_meta, Some(meta));
    assert!(back.scores[[3, 2]].is_nan());
    approx::assert_abs_diff_eq!(back.scores[[5, 1]], scores.scores[[5, 1]], epsilon = 1e-12);
}

#[test]
fn scores_without_sidecar_still_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.csv");
    std::fs::write(&path, "subject,LL,ML,MH,HH\n27,1.0,2.0,3.0,4.0\n").unwrap();
    let (scores, meta) = RewpScores::load(&path).unwrap();
    assert!(meta.is_none());
    assert!(scores.key_map.is_none());
    assert_eq!(scores.scores.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn learner_restriction_follows_the_subject_table() {
    let table = SubjectTable::builtin();
    let learners = group().restrict(&table.with_learner(true));
    let others = group().restrict(&table.with_learner(false));
    assert_eq!(learners.n_subjects() + others.n_subjects(), 12);
    assert_eq!(others.subjects, vec![SubjectId(29), SubjectId(30), SubjectId(32), SubjectId(33)]);
    assert_eq!(others.scores.row(0), group().scores.row(2));
}

#[test]
fn consistent_level_effect_is_significant() {
    let report = run_parametric(&group()).unwrap();
    assert_eq!(report.ttest_ml_ll.n, 12);
    assert_eq!(report.ttest_ml_ll.df, 11);
    assert!(report.ttest_ml_ll.t > 0.0);
    assert!(report.ttest_ml_ll.p < 1e-3);
    assert!(report.ttest_mh_hh.t > 0.0);
    assert!(report.anova.p < 1e-3);
    assert_eq!((report.anova.df1, report.anova.df2), (3, 33));
}

#[test]
fn robustness_is_seeded_and_agrees_with_the_t_test() {
    let settings = RobustnessSettings { n_perm: 999, n_boot: 999, seed: 42, ..Default::default() };
    let a = run_robustness(&group(), &settings).unwrap();
    let b = run_robustness(&group(), &settings).unwrap();
    assert_eq!(a, b);

    assert!(a.perm_ml_ll.p_perm < 0.05);
    assert!(a.perm_mh_hh.p_perm < 0.05);
    assert!(a.boot_ml_ll.ci_mean.0 > 0.0);
    assert!(a.boot_ml_ll.ci_mean.0 <= a.boot_ml_ll.mean_diff && a.boot_ml_ll.mean_diff <= a.boot_ml_ll.ci_mean.1);

    let reseeded = run_robustness(&group(), &RobustnessSettings { seed: 43, ..settings }).unwrap();
    assert_ne!(reseeded.perm_ml_ll.perm_stats, a.perm_ml_ll.perm_stats);
    approx::assert_abs_diff_eq!(reseeded.perm_ml_ll.stat_obs, a.perm_ml_ll.stat_obs);
}

#[test]
fn full_stats_run_writes_both_tables() {
    let dir = tempfile::tempdir().unwrap();
    let scores = group();
    let p = run_parametric(&scores).unwrap().save(&dir.path().join("out/param")).unwrap();
    let settings = RobustnessSettings { n_perm: 99, n_boot: 99, ..Default::default() };
    let r = run_robustness(&scores, &settings).unwrap().save(&dir.path().join("out/robust")).unwrap();
    assert!(p.exists() && r.exists());
    assert!(dir.path().join("out/param_raw.json").exists());
    assert!(dir.path().join("out/robust_raw.json").exists());
}
