/// Synthetic recordings and trial sets shared by the integration tests.
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rewp::{
    epoch::epoch_events, events::events_from_annotations, Annotation, EpochWindow, Signal, TrialSet,
};

pub fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Uniform noise of half-width `amp` volts on every channel.
pub fn noise(n_ch: usize, n_times: usize, amp: f64, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n_ch, n_times), |_| rng.random_range(-amp..amp))
}

#[allow(unused)]
/// Slow two-tone signal, a few µV, never flat and with small steps.
pub fn smooth(n_ch: usize, n_times: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_ch, n_times), |(c, t)| {
        let t = t as f64;
        5e-6 * (0.7 * t + c as f64).sin() + 2e-6 * (0.13 * t).cos()
    })
}

#[allow(unused)]
/// Cut `window` trials at every annotation of `signal`.
pub fn trials_at(signal: &Signal, window: &EpochWindow) -> TrialSet {
    let (events, vocab) = events_from_annotations(signal);
    epoch_events(signal, &events, &vocab, window).unwrap()
}

#[allow(unused)]
/// Annotation every `spacing` seconds starting at `first`, labels cycled.
pub fn annotations(labels: &[&str], first: f64, spacing: f64) -> Vec<Annotation> {
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| Annotation::new(first + i as f64 * spacing, *l))
        .collect()
}

#[allow(unused)]
pub const SFREQ: f64 = 250.0;

#[allow(unused)]
/// Task layout: `(task-start label, win marker, loss marker)` per reward level.
pub const LEVELS: [(&str, &str, &str); 4] = [
    ("Stimulus:S  1", "Stimulus:S  6", "Stimulus:S  7"),
    ("Stimulus:S 11", "Stimulus:S 16", "Stimulus:S 17"),
    ("Stimulus:S 21", "Stimulus:S 26", "Stimulus:S 27"),
    ("Stimulus:S 31", "Stimulus:S 36", "Stimulus:S 37"),
];

#[allow(unused)]
/// Seconds between consecutive task starts.
pub const TRIAL_SPACING: f64 = 3.5;

#[allow(unused)]
/// Feedback delay after each task start.
pub const FEEDBACK_DELAY: f64 = 1.5;

#[allow(unused)]
/// Reward-task recording at 250 Hz with channels `FCz, Cz, TP9, TP10`.
///
/// Levels run one after the other, `per_level` trials each, alternating
/// win and loss starting with a win. Every win adds a Gaussian bump of
/// `effect` volts at FCz, peaking 290 ms after feedback.
pub fn reward_task(per_level: usize, effect: f64, seed: u64) -> Signal {
    let n_trials = per_level * LEVELS.len();
    let duration = 2.0 + n_trials as f64 * TRIAL_SPACING + 5.0;
    let n_times = (duration * SFREQ) as usize;
    let mut data = noise(4, n_times, 3e-6, seed);

    let mut ann = Vec::with_capacity(2 * n_trials);
    for (level, &(start, win, loss)) in LEVELS.iter().enumerate() {
        for k in 0..per_level {
            let onset = 2.0 + (level * per_level + k) as f64 * TRIAL_SPACING;
            let feedback = onset + FEEDBACK_DELAY;
            let is_win = k % 2 == 0;
            ann.push(Annotation::new(onset, start));
            ann.push(Annotation::new(feedback, if is_win { win } else { loss }));
            if is_win {
                let peak = feedback + 0.290;
                for t in 0..n_times {
                    let dt = t as f64 / SFREQ - peak;
                    data[[0, t]] += effect * (-0.5 * (dt / 0.040).powi(2)).exp();
                }
            }
        }
    }
    Signal::new(data, SFREQ, names(&["FCz", "Cz", "TP9", "TP10"]))
        .unwrap()
        .with_annotations(ann)
}
