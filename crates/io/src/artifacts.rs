//! Run artifacts: merged rows, predictions, metrics.
//!
//! Everything is written once, after labeling and scoring are complete.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use concord_recon::merge::{MergedTable, CONSTRUCT_KEY_COLUMN, ID_KEY_COLUMN};
use concord_recon::model::{ArtifactPaths, RunResult};
use concord_recon::scoring::ConstructMetrics;
use serde::Serialize;

use crate::error::IoError;

/// Prediction value stored in the `.npy` array for rows left unpredicted.
pub const NPY_MISSING: i32 = -1;

/// Write all six artifacts named in the run report.
pub fn write_all(result: &RunResult) -> Result<&ArtifactPaths, IoError> {
    let paths = &result.report.artifacts;
    ensure_parent(Path::new(&paths.metrics_json))?;

    let preds = result.merged.predictions();
    write_merged_csv(Path::new(&paths.merged_with_preds_csv), &result.merged)?;
    write_npy(Path::new(&paths.preds_npy), &preds)?;
    write_preds_csv(Path::new(&paths.preds_csv), &preds)?;
    write_per_construct_csv(Path::new(&paths.per_construct_csv), &result.metrics.per_construct)?;
    write_json(Path::new(&paths.per_construct_json), &result.metrics.per_construct)?;
    write_json(Path::new(&paths.metrics_json), &result.report)?;

    for p in paths.all() {
        log::debug!("wrote {p}");
    }
    Ok(paths)
}

fn ensure_parent(path: &Path) -> Result<(), IoError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| IoError::write(dir, e))
        }
        _ => Ok(()),
    }
}

fn format_label(label: Option<f64>) -> String {
    label.map(|v| v.to_string()).unwrap_or_default()
}

fn format_pred(pred: Option<u8>) -> String {
    pred.map(|p| p.to_string()).unwrap_or_default()
}

/// Raw columns, then `_id_key` (when the raw side has an id), `_construct_canon`,
/// `human_label` and `model_pred`.
pub fn write_merged_csv(path: &Path, merged: &MergedTable) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::csv(path, e))?;

    let with_id = merged.has_raw_id;
    let mut header: Vec<&str> = merged.columns.iter().map(String::as_str).collect();
    if with_id {
        header.push(ID_KEY_COLUMN);
    }
    header.extend([CONSTRUCT_KEY_COLUMN, "human_label", "model_pred"]);
    writer.write_record(&header).map_err(|e| IoError::csv(path, e))?;

    for row in &merged.rows {
        let mut record: Vec<String> = row.values.iter().map(|c| c.to_text()).collect();
        if with_id {
            record.push(row.id_key.clone().unwrap_or_default());
        }
        record.push(row.construct_key.clone());
        record.push(format_label(row.human_label));
        record.push(format_pred(row.prediction));
        writer.write_record(&record).map_err(|e| IoError::csv(path, e))?;
    }

    writer.flush().map_err(|e| IoError::write(path, e))
}

/// `row_index,pred`; excluded rows have an empty `pred`.
pub fn write_preds_csv(path: &Path, preds: &[Option<u8>]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::csv(path, e))?;
    writer
        .write_record(["row_index", "pred"])
        .map_err(|e| IoError::csv(path, e))?;
    for (i, p) in preds.iter().enumerate() {
        writer
            .write_record([i.to_string(), format_pred(*p)])
            .map_err(|e| IoError::csv(path, e))?;
    }
    writer.flush().map_err(|e| IoError::write(path, e))
}

pub fn write_per_construct_csv(path: &Path, rows: &[ConstructMetrics]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| IoError::csv(path, e))?;
    }
    if rows.is_empty() {
        writer
            .write_record(PER_CONSTRUCT_FIELDS)
            .map_err(|e| IoError::csv(path, e))?;
    }
    writer.flush().map_err(|e| IoError::write(path, e))
}

pub const PER_CONSTRUCT_FIELDS: [&str; 6] = [
    "construct",
    "freq_in_data",
    "hum_model_kappa",
    "hum_model_precision",
    "hum_model_recall",
    "n_eval",
];

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| IoError::json(path, e))?;
    writer.write_all(b"\n").map_err(|e| IoError::write(path, e))?;
    writer.flush().map_err(|e| IoError::write(path, e))
}

// ---------------------------------------------------------------------------
// NumPy .npy (format 1.0)
// ---------------------------------------------------------------------------

/// Little-endian `int32` 1-D array; `None` is stored as [`NPY_MISSING`].
pub fn npy_bytes(preds: &[Option<u8>]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<i4', 'fortran_order': False, 'shape': ({},), }}",
        preds.len()
    );
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n' ≡ 0 (mod 64)
    let unpadded = 10 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(10 + header_len + preds.len() * 4);
    out.extend_from_slice(b"\x93NUMPY");
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for p in preds {
        let v = p.map_or(NPY_MISSING, i32::from);
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn write_npy(path: &Path, preds: &[Option<u8>]) -> Result<(), IoError> {
    std::fs::write(path, npy_bytes(preds)).map_err(|e| IoError::write(path, e))
}
