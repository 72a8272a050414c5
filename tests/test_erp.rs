mod common;
use common::noise;
use ndarray::{Array1, Array3, Axis};
use rewp::erp::{combine_evoked, difference_wave, mean_amplitude, peak_to_peak, trimmed_mean};
use rewp::Evoked;

fn evoked_on(data: ndarray::Array2<f64>, ch_names: &[&str], comment: &str) -> Evoked {
    let ch_names = ch_names.iter().map(|c| c.to_string()).collect();
    Evoked::new(data, ch_names, 250.0, -0.2, 20.0, comment).unwrap()
}

fn evoked(data: ndarray::Array2<f64>, comment: &str) -> Evoked {
    evoked_on(data, &["FCz", "Cz"], comment)
}

#[test]
fn zero_trim_matches_arithmetic_mean() {
    let flat = noise(1, 30 * 4 * 25, 10e-6, 3);
    let x = Array3::from_shape_vec((30, 4, 25), flat.into_raw_vec_and_offset().0).unwrap();
    let got = trimmed_mean(x.view(), 0.0).unwrap();
    let want = x.mean_axis(Axis(0)).unwrap();
    for (g, w) in got.iter().zip(want.iter()) {
        approx::assert_abs_diff_eq!(g, w, epsilon = 1e-18);
    }
}

#[test]
fn trim_removes_outlier_trials() {
    let mut x = Array3::from_elem((20, 1, 3), 2e-6);
    x[[0, 0, 1]] = 1.0;
    x[[7, 0, 1]] = -1.0;
    let got = trimmed_mean(x.view(), 0.05).unwrap();
    approx::assert_abs_diff_eq!(got[[0, 1]], 2e-6, epsilon = 1e-18);
    let plain = trimmed_mean(x.view(), 0.0).unwrap();
    approx::assert_abs_diff_eq!(plain[[0, 1]], 18.0 * 2e-6 / 20.0, epsilon = 1e-12);
}

#[test]
fn difference_wave_is_antisymmetric() {
    let a = evoked(noise(2, 201, 5e-6, 11), "win");
    let b = evoked(noise(2, 201, 5e-6, 12), "loss");
    let ab = difference_wave(&a, &b).unwrap();
    let ba = difference_wave(&b, &a).unwrap();
    for (x, y) in ab.data().iter().zip(ba.data().iter()) {
        approx::assert_abs_diff_eq!(*x, -*y, epsilon = 1e-20);
    }
    approx::assert_abs_diff_eq!(ab.nave(), 10.0, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(ab.nave(), ba.nave(), epsilon = 1e-12);
}

#[test]
fn mismatched_axes_refuse_to_combine() {
    let a = evoked(noise(2, 201, 5e-6, 1), "a");
    let b = evoked_on(noise(2, 201, 5e-6, 2), &["FCz", "Pz"], "b");
    assert!(combine_evoked(&[(&a, 1.0), (&b, 1.0)]).is_err());
}

#[test]
fn window_features_in_microvolts() {
    // Ramp at FCz: value at sample i is i µV.
    let mut data = ndarray::Array2::zeros((2, 201));
    data.row_mut(0).assign(&Array1::from_shape_fn(201, |i| i as f64 * 1e-6));
    let ev = evoked(data, "ramp");
    // 0.24 s → sample 110, 0.34 s → sample 135 (inclusive).
    let mean = mean_amplitude(&ev, "FCz", 0.240, 0.340).unwrap();
    approx::assert_abs_diff_eq!(mean, (110.0 + 135.0) / 2.0, epsilon = 1e-9);

    let ptp = peak_to_peak(&ev, "FCz", 0.240, 0.340).unwrap();
    approx::assert_abs_diff_eq!(ptp.amplitude_uv, 25.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(ptp.neg_time_ms, 240.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(ptp.pos_time_ms, 340.0, epsilon = 1e-9);
    assert!(mean_amplitude(&ev, "Oz", 0.24, 0.34).is_err());
}

#[test]
fn feature_window_beyond_the_epoch_fails() {
    // Axis runs -0.2 .. 0.6 s.
    let ev = evoked(noise(2, 201, 5e-6, 4), "short");
    assert!(mean_amplitude(&ev, "FCz", 0.8, 0.9).is_err());
    assert!(peak_to_peak(&ev, "FCz", -0.5, -0.3).is_err());
    // A window running past the last sample uses what is there.
    let tail = mean_amplitude(&ev, "FCz", 0.56, 0.9).unwrap();
    let last = mean_amplitude(&ev, "FCz", 0.56, 0.6).unwrap();
    approx::assert_abs_diff_eq!(tail, last, epsilon = 1e-12);
}

#[test]
fn evoked_checks_its_shape() {
    assert!(Evoked::new(noise(2, 10, 1e-6, 5), vec!["FCz".into()], 250.0, 0.0, 1.0, "x").is_err());
    assert!(Evoked::new(noise(1, 10, 1e-6, 5), vec!["FCz".into()], 0.0, 0.0, 1.0, "x").is_err());
}
