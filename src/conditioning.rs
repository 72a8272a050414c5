//! Signal-conditioning chain.
//!
//! Stages run in a fixed order; each takes a `&Signal` and returns a new
//! one:
//!
//! ```text
//! raw
//!   ├─ add_reference_channel   zero-valued recording reference (Fz)
//!   ├─ resample                FFT resampler → target_sfreq (250 Hz)
//!   ├─ filter_signal           FIR band-pass + notch / line subtraction
//!   ├─ drop_bad_channels       mark bad (interpolate later) or remove
//!   ├─ reref_mastoids          average of TP9/TP10, or the one present
//!   │     … trials, decomposition …
//!   └─ interpolate_marked      spherical spline over the bads set
//! ```
//!
//! [`condition`] runs the first five stages; [`interpolate_marked`] is
//! called by the orchestrator once artifact components are removed.
use crate::config::{ConditioningConfig, LineNoiseMethod};
use crate::error::Result;
use crate::filter::{apply_fir_zero_phase, design_bandpass, design_notch};
use crate::interpolate::interpolate_bads;
use crate::line_noise::remove_line_noise;
use crate::reference::{add_reference_channel, reref_mastoids};
use crate::resample::resample;
use crate::signal::Signal;

/// Sphere origin used for interpolation (head coordinates, metres).
pub const HEAD_ORIGIN: [f64; 3] = [0.0, 0.0, 0.0];

/// Band-pass, then the configured line-noise removal.
pub fn filter_signal(signal: &Signal, cfg: &ConditioningConfig) -> Result<Signal> {
    let (l_freq, h_freq) = cfg.bandpass;
    let h = design_bandpass(Some(l_freq), Some(h_freq), signal.sfreq)?;
    let mut out = signal.clone();
    apply_fir_zero_phase(&mut out.data, &h)?;
    log::debug!("band-pass {l_freq}-{h_freq} Hz, {} taps", h.len());

    match cfg.line_noise {
        LineNoiseMethod::Notch => {
            let notch = design_notch(cfg.line_freq, out.sfreq)?;
            apply_fir_zero_phase(&mut out.data, &notch)?;
            log::debug!("notch at {} Hz, {} taps", cfg.line_freq, notch.len());
            Ok(out)
        }
        LineNoiseMethod::SpectralSubtraction => remove_line_noise(&out, cfg.line_freq),
    }
}

/// Take `names` out of service.
///
/// With `interpolate` they are added to the bads set and kept for
/// [`interpolate_marked`]; otherwise they are removed from the signal.
/// Names not in the recording are skipped.
pub fn drop_bad_channels(signal: &Signal, names: &[String], interpolate: bool) -> Signal {
    let present: Vec<String> = names.iter().filter(|n| signal.has_channel(n)).cloned().collect();
    for n in names.iter().filter(|n| !signal.has_channel(n)) {
        log::warn!("bad channel '{n}' not in recording");
    }
    if present.is_empty() {
        return signal.clone();
    }
    if interpolate {
        log::info!("marking {present:?} bad");
        let mut out = signal.clone();
        out.bads.extend(present);
        out
    } else {
        log::info!("dropping {present:?}");
        signal.drop_channels(&present)
    }
}

/// Interpolate whatever is in the bads set; a no-op when it is empty.
pub fn interpolate_marked(signal: &Signal) -> Result<Signal> {
    interpolate_bads(signal, HEAD_ORIGIN)
}

/// Stages 1–5 of the chain.
///
/// `ref_pos` is the sensor position given to the added reference channel.
///
/// # Errors
///
/// * [`PipelineError::InvalidParameter`](crate::PipelineError) for filter
///   cutoffs outside the resampled band, or a reference channel that is
///   already present.
/// * [`PipelineError::NoReferenceChannel`](crate::PipelineError) when no
///   mastoid survives channel dropping.
pub fn condition(raw: &Signal, cfg: &ConditioningConfig, bad_channels: &[String], ref_pos: Option<[f64; 3]>) -> Result<Signal> {
    let mut signal = match &cfg.added_reference {
        Some(name) => add_reference_channel(raw, name, ref_pos)?,
        None => raw.clone(),
    };
    signal = resample(&signal, cfg.target_sfreq)?;
    signal = filter_signal(&signal, cfg)?;
    signal = drop_bad_channels(&signal, bad_channels, cfg.interpolate);
    let (a, b) = (&cfg.mastoids.0, &cfg.mastoids.1);
    reref_mastoids(&signal, (a.as_str(), b.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn signal(ch: &[&str], n_times: usize, sfreq: f64) -> Signal {
        let data = Array2::from_shape_fn((ch.len(), n_times), |(c, t)| {
            1e-5 * ((c + 1) as f64 * t as f64 * 0.05).sin()
        });
        Signal::new(data, sfreq, names(ch)).unwrap()
    }

    #[test]
    fn marking_keeps_channels() {
        let s = signal(&["Cz", "Pz", "TP9"], 50, 250.0);
        let marked = drop_bad_channels(&s, &names(&["Pz", "O1"]), true);
        assert_eq!(marked.n_channels(), 3);
        assert!(marked.bads.contains("Pz"));
        let dropped = drop_bad_channels(&s, &names(&["Pz"]), false);
        assert_eq!(dropped.ch_names, names(&["Cz", "TP9"]));
        assert!(dropped.bads.is_empty());
    }

    #[test]
    fn chain_output_shape() {
        let s = signal(&["Cz", "Pz", "TP9", "TP10"], 5000, 500.0);
        let cfg = ConditioningConfig { interpolate: false, ..Default::default() };
        let out = condition(&s, &cfg, &names(&["Pz"]), None).unwrap();
        assert_eq!(out.sfreq, 250.0);
        assert_eq!(out.n_times(), 2500);
        assert_eq!(out.ch_names, names(&["Cz", "TP9", "TP10", "Fz"]));
    }

    #[test]
    fn chain_without_mastoids_fails() {
        let s = signal(&["Cz", "Pz"], 2000, 250.0);
        let cfg = ConditioningConfig::default();
        assert!(matches!(
            condition(&s, &cfg, &[], None),
            Err(crate::PipelineError::NoReferenceChannel(_))
        ));
    }

    #[test]
    fn interpolation_without_bads_is_noop() {
        let s = signal(&["Cz", "Pz"], 20, 250.0);
        let out = interpolate_marked(&s).unwrap();
        assert_eq!(out.data, s.data);
    }
}
