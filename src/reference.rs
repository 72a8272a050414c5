//! Reference handling.
//!
//! * [`add_reference_channel`] matches `mne.add_reference_channels`: the
//!   recording reference is appended as an all-zero channel.
//! * [`set_reference`] matches `raw.set_eeg_reference(ref_channels=[...])`:
//!   the mean of the reference channels is subtracted from every channel.
//! * [`reref_mastoids`] picks the reference from two designated mastoids.
//!
//! `data`: [C, T]  →  `data[c, t] -= mean(data[ref, t])`
use ndarray::{concatenate, Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::signal::Signal;

/// Append a zero-valued channel called `name`.
///
/// When the signal carries positions, the new row uses `pos`, or NaN when
/// none is given (such a channel cannot take part in interpolation).
pub fn add_reference_channel(signal: &Signal, name: &str, pos: Option<[f64; 3]>) -> Result<Signal> {
    if signal.has_channel(name) {
        return Err(PipelineError::InvalidParameter(format!(
            "reference channel '{name}' already present"
        )));
    }
    let zeros = Array2::<f64>::zeros((1, signal.n_times()));
    let data = concatenate(Axis(0), &[signal.data.view(), zeros.view()])
        .map_err(|e| PipelineError::ShapeMismatch(e.to_string()))?;

    let chan_pos = match &signal.chan_pos {
        Some(p) => {
            let row = Array2::from_shape_vec((1, 3), pos.unwrap_or([f64::NAN; 3]).to_vec())
                .map_err(|e| PipelineError::ShapeMismatch(e.to_string()))?;
            Some(
                concatenate(Axis(0), &[p.view(), row.view()])
                    .map_err(|e| PipelineError::ShapeMismatch(e.to_string()))?,
            )
        }
        None => None,
    };

    let mut out = signal.clone();
    out.data = data;
    out.ch_names.push(name.to_string());
    out.chan_pos = chan_pos;
    log::debug!("added zero reference channel {name}");
    Ok(out)
}

/// Re-reference to the mean of `ref_channels`.
pub fn set_reference(signal: &Signal, ref_channels: &[String]) -> Result<Signal> {
    if ref_channels.is_empty() {
        return Err(PipelineError::NoReferenceChannel(Vec::new()));
    }
    let idx = ref_channels
        .iter()
        .map(|ch| signal.require_channel(ch))
        .collect::<Result<Vec<usize>>>()?;

    let reference: Array1<f64> = signal
        .data
        .select(Axis(0), &idx)
        .mean_axis(Axis(0))
        .ok_or_else(|| PipelineError::ShapeMismatch("empty reference".into()))?;

    let mut out = signal.clone();
    for mut row in out.data.rows_mut() {
        row -= &reference;
    }
    Ok(out)
}

/// Reference to the average of the two mastoids.
///
/// With only one mastoid present it becomes the sole reference and is then
/// dropped (it would be a flat line). With neither present there is no
/// reference and the call fails.
pub fn reref_mastoids(signal: &Signal, mastoids: (&str, &str)) -> Result<Signal> {
    let (a, b) = mastoids;
    match (signal.has_channel(a), signal.has_channel(b)) {
        (true, true) => {
            log::info!("average reference {a}/{b}: keeping both");
            set_reference(signal, &[a.to_string(), b.to_string()])
        }
        (true, false) | (false, true) => {
            let only = if signal.has_channel(a) { a } else { b };
            log::info!("single reference {only}: dropping it to avoid a flat line");
            let rereferenced = set_reference(signal, &[only.to_string()])?;
            Ok(rereferenced.drop_channels(&[only.to_string()]))
        }
        (false, false) => Err(PipelineError::NoReferenceChannel(vec![a.to_string(), b.to_string()])),
    }
}
