//! Joining raw entities to human labels.
//!
//! The join is always a left join from the raw side: every raw row appears
//! exactly once and in input order. The label side is indexed by key and the
//! first label row per key wins; later rows with the same key are counted as
//! shadowed rather than multiplying raw rows.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::canon::{canonicalize, normalize_id};
use crate::coerce::ColumnRoles;
use crate::error::ReconError;
use crate::reshape::LongLabels;
use crate::table::{Cell, Table};

pub const ID_KEY_COLUMN: &str = "_id_key";
pub const CONSTRUCT_KEY_COLUMN: &str = "_construct_canon";

/// Which keys the join uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKeys {
    IdAndConstruct,
    /// Labels assumed shared per construct across all entities.
    ConstructOnly,
    /// Label table without construct names.
    IdOnly,
}

impl MergeKeys {
    /// Key column names as they appear in the merged artifact.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::IdAndConstruct => &[ID_KEY_COLUMN, CONSTRUCT_KEY_COLUMN],
            Self::ConstructOnly => &[CONSTRUCT_KEY_COLUMN],
            Self::IdOnly => &[ID_KEY_COLUMN],
        }
    }

    pub fn uses_id(&self) -> bool {
        matches!(self, Self::IdAndConstruct | Self::IdOnly)
    }

    pub fn uses_construct(&self) -> bool {
        matches!(self, Self::IdAndConstruct | Self::ConstructOnly)
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::IdAndConstruct)
    }
}

impl Serialize for MergeKeys {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.columns().serialize(serializer)
    }
}

/// Decided before any label is looked at; carries the warnings it raised.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub keys: MergeKeys,
    pub raw_id: Option<usize>,
    pub raw_text: usize,
    pub raw_construct: usize,
    pub warnings: Vec<String>,
}

/// Counts recorded by the join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeDiagnostics {
    pub matched: usize,
    pub unmatched_raw: usize,
    pub unused_labels: usize,
    pub shadowed: usize,
    pub empty_text: usize,
}

impl MergeDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.unmatched_raw == 0 && self.shadowed == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    /// Raw row values, in raw column order.
    pub values: Vec<Cell>,
    pub id_key: Option<String>,
    /// Construct name as written in the raw row.
    pub construct: String,
    pub construct_key: String,
    pub text: String,
    pub human_label: Option<f64>,
    pub prediction: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub keys: MergeKeys,
    /// The raw side carries the id column, whether or not it was joined on.
    pub has_raw_id: bool,
    pub rows: Vec<MergedRow>,
    pub diagnostics: MergeDiagnostics,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn predictions(&self) -> Vec<Option<u8>> {
        self.rows.iter().map(|r| r.prediction).collect()
    }
}

/// Choose the key set. Requires text and construct columns on the raw side.
pub fn plan(raw: &Table, roles: &ColumnRoles, long: &LongLabels) -> Result<MergePlan, ReconError> {
    let required = |column: &str| {
        raw.column_index(column).ok_or_else(|| ReconError::MissingColumn {
            table: "raw".into(),
            column: column.into(),
        })
    };
    let raw_text = required(&roles.text)?;
    let raw_construct = required(&roles.construct)?;

    let raw_id = roles.id.as_deref().and_then(|c| raw.column_index(c));
    let coded_has_id = roles.id.is_some() && long.id_column == roles.id;

    let mut warnings = Vec::new();
    let keys = if raw_id.is_some() && coded_has_id {
        if long.has_construct {
            MergeKeys::IdAndConstruct
        } else {
            warnings.push(format!(
                "coded data has no construct column; merging by id '{}' only",
                roles.id.as_deref().unwrap_or_default()
            ));
            MergeKeys::IdOnly
        }
    } else if long.has_construct {
        warnings.push(match roles.id.as_deref() {
            Some(id) => format!(
                "id column '{id}' missing on one side; falling back to construct-only merge \
                 (assumes labels are per-construct globally)"
            ),
            None => "no id column given; falling back to construct-only merge \
                     (assumes labels are per-construct globally)"
                .to_string(),
        });
        MergeKeys::ConstructOnly
    } else {
        return Err(ReconError::NoMergeKeys(format!(
            "coded data has neither a construct column nor an id column matching '{}'",
            roles.id.as_deref().unwrap_or("<none>")
        )));
    };

    for w in &warnings {
        log::warn!("{w}");
    }

    Ok(MergePlan {
        keys,
        raw_id,
        raw_text,
        raw_construct,
        warnings,
    })
}

type JoinKey = (Option<String>, String);

fn join_key(keys: MergeKeys, id: Option<String>, construct_key: &str) -> Option<JoinKey> {
    let construct = if keys.uses_construct() {
        construct_key.to_string()
    } else {
        String::new()
    };
    if keys.uses_id() {
        // A missing id never matches.
        Some((Some(id?), construct))
    } else {
        Some((None, construct))
    }
}

/// Left join `raw` to `long` under `plan`.
pub fn merge(raw: &Table, long: &LongLabels, plan: &MergePlan) -> MergedTable {
    let mut diagnostics = MergeDiagnostics::default();

    let mut index: HashMap<JoinKey, usize> = HashMap::with_capacity(long.len());
    let mut usable = 0;
    for (i, label) in long.rows.iter().enumerate() {
        let Some(key) = join_key(plan.keys, normalize_id(&label.id), &label.construct_key) else {
            continue;
        };
        usable += 1;
        if index.contains_key(&key) {
            diagnostics.shadowed += 1;
        } else {
            index.insert(key, i);
        }
    }

    let mut used = vec![false; long.len()];
    let mut rows = Vec::with_capacity(raw.len());
    for record in raw.rows() {
        let id_key = plan.raw_id.and_then(|i| normalize_id(&record[i]));
        let construct = record[plan.raw_construct].to_text();
        let construct_key = canonicalize(&construct);

        let text_cell = &record[plan.raw_text];
        if text_cell.is_empty() {
            diagnostics.empty_text += 1;
        }

        let hit = join_key(plan.keys, id_key.clone(), &construct_key).and_then(|k| index.get(&k).copied());
        let human_label = match hit {
            Some(i) => {
                used[i] = true;
                diagnostics.matched += 1;
                long.rows[i].human_label
            }
            None => {
                diagnostics.unmatched_raw += 1;
                None
            }
        };

        rows.push(MergedRow {
            values: record.clone(),
            id_key,
            construct,
            construct_key,
            text: text_cell.to_text(),
            human_label,
            prediction: None,
        });
    }
    diagnostics.unused_labels = long.len() - used.iter().filter(|u| **u).count();

    log::debug!(
        "merged {} raw rows against {} usable label rows",
        raw.len(),
        usable
    );
    if diagnostics.empty_text > 0 {
        log::warn!("{} raw rows have an empty text snippet", diagnostics.empty_text);
    }
    if !diagnostics.is_clean() {
        log::warn!(
            "merge cardinality: {} matched, {} raw rows without a label, {} label rows shadowed by an earlier duplicate key",
            diagnostics.matched,
            diagnostics.unmatched_raw,
            diagnostics.shadowed
        );
    }

    MergedTable {
        columns: raw.columns().to_vec(),
        keys: plan.keys,
        has_raw_id: plan.raw_id.is_some(),
        rows,
        diagnostics,
    }
}
