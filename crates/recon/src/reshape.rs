//! Coded labels: wide (one column per construct) to long (one row per
//! entity × construct).

use serde::Serialize;

use crate::canon::canonicalize;
use crate::error::ReconError;
use crate::table::{Cell, Table};

/// Id column conventionally present in coded exports.
pub const FALLBACK_ID_COLUMN: &str = "task_submit_id";

/// One human label for an (entity, construct) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub id: Cell,
    pub construct: String,
    pub construct_key: String,
    pub human_label: Option<f64>,
}

/// Long-form labels. Built once per run, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LongLabels {
    /// Header of the carried id column, if any.
    pub id_column: Option<String>,
    /// `false` for a single-label table without construct names.
    pub has_construct: bool,
    pub rows: Vec<LabelRow>,
}

impl LongLabels {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Index of the column carried through as the id: the requested column,
/// then `task_submit_id`, then the first column.
pub fn id_column_index(coded: &Table, id_col: Option<&str>) -> Option<usize> {
    id_col
        .and_then(|c| coded.column_index(c))
        .or_else(|| coded.column_index(FALLBACK_ID_COLUMN))
        .or_else(|| (coded.width() > 0).then_some(0))
}

/// Every header except the carried id column.
pub fn construct_columns(coded: &Table, id_col: Option<&str>) -> Vec<String> {
    let id_idx = id_column_index(coded, id_col);
    coded
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != id_idx)
        .map(|(_, c)| c.clone())
        .collect()
}

/// Melt a wide coded table. N rows × M construct columns give N·M label rows,
/// entity-major.
pub fn melt(coded: &Table, id_col: Option<&str>) -> LongLabels {
    let id_idx = id_column_index(coded, id_col);
    let value_cols: Vec<(usize, String, String)> = coded
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != id_idx)
        .map(|(i, c)| (i, c.clone(), canonicalize(c)))
        .collect();

    let mut rows = Vec::with_capacity(coded.len() * value_cols.len());
    for record in coded.rows() {
        let id = id_idx.map(|i| record[i].clone()).unwrap_or(Cell::Empty);
        for (idx, name, key) in &value_cols {
            rows.push(LabelRow {
                id: id.clone(),
                construct: name.clone(),
                construct_key: key.clone(),
                human_label: record[*idx].as_f64(),
            });
        }
    }

    LongLabels {
        id_column: id_idx.map(|i| coded.columns()[i].clone()),
        has_construct: true,
        rows,
    }
}

/// Coded data that already has one label column per row.
pub fn from_label_column(
    coded: &Table,
    label_col: &str,
    id_col: Option<&str>,
    construct_col: &str,
) -> Result<LongLabels, ReconError> {
    let label_idx = coded.column_index(label_col).ok_or_else(|| ReconError::MissingColumn {
        table: "coded".into(),
        column: label_col.into(),
    })?;
    let id_idx = id_col.and_then(|c| coded.column_index(c));
    let construct_idx = coded.column_index(construct_col);
    if construct_idx.is_none() {
        log::warn!("'{construct_col}' not found in coded data; labels will be merged by id only");
    }

    let rows = coded
        .rows()
        .iter()
        .map(|record| {
            let construct = construct_idx.map(|i| record[i].to_text()).unwrap_or_default();
            LabelRow {
                id: id_idx.map(|i| record[i].clone()).unwrap_or(Cell::Empty),
                construct_key: canonicalize(&construct),
                construct,
                human_label: record[label_idx].as_f64(),
            }
        })
        .collect();

    Ok(LongLabels {
        id_column: id_idx.map(|i| coded.columns()[i].clone()),
        has_construct: construct_idx.is_some(),
        rows,
    })
}
