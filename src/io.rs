//! Safetensors I/O for recordings and fitted decompositions.
//!
//! Recording layout (`<subject>.safetensors`):
//!
//! | key            | dtype     | shape   |                                   |
//! |----------------|-----------|---------|-----------------------------------|
//! | `data`         | F32 / F64 | [C, T]  | volts                             |
//! | `sfreq`        | F32 / F64 | [1]     | Hz                                |
//! | `ch_names`     | U8        | [n]     | newline-separated                 |
//! | `chan_pos`     | F32 / F64 | [C, 3]  | optional, metres                  |
//! | `ref_pos`      | F32 / F64 | [3]     | optional, added reference channel |
//! | `onsets`       | F64       | [N]     | optional, annotation onsets (s)   |
//! | `descriptions` | U8        | [n]     | optional, newline-separated       |
//!
//! Decomposition layout: `mixing [C, K]`, `unmixing [K, C]`, `ch_names`.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::Deserialize;

use crate::events::Annotation;
use crate::ica::IcaModel;
use crate::signal::Signal;

#[derive(Debug, Clone, Deserialize)]
struct TensorEntry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// A parsed safetensors buffer.
pub struct SafeTensors {
    bytes: Vec<u8>,
    header: HashMap<String, TensorEntry>,
    data_start: usize,
}

impl SafeTensors {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let Some(len_bytes) = bytes.get(..8) else {
            bail!("safetensors file too small");
        };
        let mut len = [0u8; 8];
        len.copy_from_slice(len_bytes);
        let n = u64::from_le_bytes(len);
        let Some(data_start) = usize::try_from(n).ok().and_then(|n| n.checked_add(8)) else {
            bail!("header length {n} overflows");
        };
        let Some(raw_header) = bytes.get(8..data_start) else {
            bail!("header length {n} exceeds file size {}", bytes.len());
        };
        let values: HashMap<String, serde_json::Value> =
            serde_json::from_slice(raw_header).context("failed to parse safetensors header")?;
        let mut header = HashMap::new();
        for (name, v) in values {
            if name == "__metadata__" {
                continue;
            }
            let entry: TensorEntry =
                serde_json::from_value(v).with_context(|| format!("bad header entry '{name}'"))?;
            header.insert(name, entry);
        }
        Ok(Self { bytes, header, data_start })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<&TensorEntry> {
        self.header.get(name).with_context(|| format!("missing '{name}' key"))
    }

    pub fn shape(&self, name: &str) -> Result<&[usize]> {
        Ok(&self.entry(name)?.shape)
    }

    fn raw(&self, name: &str) -> Result<&[u8]> {
        let [s, e] = self.entry(name)?.data_offsets;
        let (Some(start), Some(end)) = (self.data_start.checked_add(s), self.data_start.checked_add(e)) else {
            bail!("'{name}' offsets {s}..{e} overflow");
        };
        self.bytes.get(start..end).with_context(|| format!("'{name}' data out of bounds"))
    }

    /// Tensor values widened to f64 (F32 or F64 storage).
    pub fn f64s(&self, name: &str) -> Result<Vec<f64>> {
        let raw = self.raw(name)?;
        match self.entry(name)?.dtype.as_str() {
            "F64" => Ok(raw
                .chunks_exact(8)
                .map(|b| {
                    let mut a = [0u8; 8];
                    a.copy_from_slice(b);
                    f64::from_le_bytes(a)
                })
                .collect()),
            "F32" => Ok(raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect()),
            other => bail!("'{name}' has dtype {other}, expected F32 or F64"),
        }
    }

    pub fn array2(&self, name: &str) -> Result<Array2<f64>> {
        let shape = self.shape(name)?;
        let &[r, c] = shape else {
            bail!("'{name}' must be 2-D, got shape {shape:?}");
        };
        Ok(Array2::from_shape_vec((r, c), self.f64s(name)?)?)
    }

    /// Newline-separated UTF-8 strings; empty lines are skipped.
    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        let text = std::str::from_utf8(self.raw(name)?).with_context(|| format!("'{name}' is not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

/// A recording plus the position of the reference channel added during
/// conditioning.
#[derive(Debug, Clone)]
pub struct Recording {
    pub signal: Signal,
    pub ref_pos: Option<[f64; 3]>,
}

pub fn read_recording(path: &Path) -> Result<Recording> {
    let st = SafeTensors::open(path)?;
    let data = st.array2("data")?;
    let sfreq = *st.f64s("sfreq")?.first().context("empty 'sfreq'")?;
    let ch_names = st.strings("ch_names")?;
    let mut signal = Signal::new(data, sfreq, ch_names)?;

    if st.contains("chan_pos") {
        signal = signal.with_positions(st.array2("chan_pos")?)?;
    }
    let ref_pos = if st.contains("ref_pos") {
        let v = st.f64s("ref_pos")?;
        let &[x, y, z] = v.as_slice() else {
            bail!("'ref_pos' must hold 3 values, got {}", v.len());
        };
        Some([x, y, z])
    } else {
        None
    };
    if st.contains("onsets") {
        let onsets = st.f64s("onsets")?;
        let desc = st.strings("descriptions")?;
        if onsets.len() != desc.len() {
            bail!("{} onsets for {} descriptions", onsets.len(), desc.len());
        }
        let annotations = onsets.into_iter().zip(desc).map(|(t, d)| Annotation::new(t, d)).collect();
        signal = signal.with_annotations(annotations);
    }
    log::info!(
        "loaded {} ch × {} samples @ {} Hz, {} annotations from {}",
        signal.n_channels(),
        signal.n_times(),
        signal.sfreq,
        signal.annotations.len(),
        path.display()
    );
    Ok(Recording { signal, ref_pos })
}

pub fn read_ica_model(path: &Path) -> Result<IcaModel> {
    let st = SafeTensors::open(path)?;
    let model = IcaModel::new(st.array2("mixing")?, st.array2("unmixing")?, st.strings("ch_names")?)?;
    log::info!("loaded {}-component decomposition from {}", model.n_components(), path.display());
    Ok(model)
}

/// Write a recording in the layout read by [`read_recording`].
pub fn write_recording(rec: &Recording, path: &Path) -> Result<()> {
    let s = &rec.signal;
    let mut w = StWriter::new();
    w.add_f64_arr2("data", &s.data);
    w.add_f64("sfreq", &[s.sfreq], &[1]);
    w.add_text("ch_names", &s.ch_names);
    if let Some(pos) = &s.chan_pos {
        w.add_f64_arr2("chan_pos", pos);
    }
    if let Some(p) = rec.ref_pos {
        w.add_f64("ref_pos", &p, &[3]);
    }
    if !s.annotations.is_empty() {
        let onsets: Vec<f64> = s.annotations.iter().map(|a| a.onset_secs).collect();
        let desc: Vec<String> = s.annotations.iter().map(|a| a.description.clone()).collect();
        w.add_f64("onsets", &onsets, &[onsets.len()]);
        w.add_text("descriptions", &desc);
    }
    w.write(path)
}

pub fn write_ica_model(model: &IcaModel, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("mixing", &model.mixing);
    w.add_f64_arr2("unmixing", &model.unmixing);
    w.add_text("ch_names", &model.ch_names);
    w.write(path)
}

/// Safetensors writer for F32, F64 and newline-joined text tensors.
///
/// ```rust,no_run
/// use rewp::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("sfreq", &[500.0], &[1]);
/// w.add_text("ch_names", &["Fz".to_string(), "FCz".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    tensors: Vec<Tensor>,
}

struct Tensor {
    name: String,
    dtype: &'static str,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, dtype: &'static str, shape: Vec<usize>, bytes: Vec<u8>) {
        self.tensors.push(Tensor { name: name.to_string(), dtype, shape, bytes });
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        self.push(name, "F32", shape.to_vec(), data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        self.push(name, "F64", shape.to_vec(), data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    /// Row-major copy of a 2-D array.
    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let bytes = arr.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, "F64", vec![arr.nrows(), arr.ncols()], bytes);
    }

    pub fn add_text(&mut self, name: &str, lines: &[String]) {
        let bytes = lines.join("\n").into_bytes();
        self.push(name, "U8", vec![bytes.len()], bytes);
    }

    /// JSON header padded with spaces to a multiple of 8 bytes.
    fn header(&self) -> Result<Vec<u8>> {
        let mut start = 0;
        let map: serde_json::Map<String, serde_json::Value> = self
            .tensors
            .iter()
            .map(|t| {
                let end = start + t.bytes.len();
                let v = serde_json::json!({ "dtype": t.dtype, "shape": t.shape, "data_offsets": [start, end] });
                start = end;
                (t.name.clone(), v)
            })
            .collect();
        let mut bytes = serde_json::to_vec(&map)?;
        bytes.resize(bytes.len().div_ceil(8) * 8, b' ');
        Ok(bytes)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let header = self.header()?;
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = std::io::BufWriter::new(file);
        out.write_all(&(header.len() as u64).to_le_bytes())?;
        out.write_all(&header)?;
        for t in &self.tensors {
            out.write_all(&t.bytes)?;
        }
        out.flush()?;
        Ok(())
    }
}
