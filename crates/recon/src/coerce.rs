//! Raw-table column discovery.
//!
//! Raw spreadsheets arrive with missing or non-standard headers. Each target
//! column (text, construct, id) is resolved by a named rule, evaluated in a
//! fixed order against the table as left by the previous rules. Rules are
//! pure: they inspect the table and return a rename, or nothing.

use serde::Serialize;

use crate::error::ReconError;
use crate::similarity::Similarity;
use crate::table::{ColumnKind, Table};

/// Minimum name similarity for adopting a column as the construct column.
pub const CONSTRUCT_NAME_CUTOFF: f64 = 0.8;

/// The column names the rest of the pipeline expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRoles {
    pub id: Option<String>,
    pub text: String,
    pub construct: String,
}

impl ColumnRoles {
    fn is_assigned(&self, name: &str) -> bool {
        name == self.text || name == self.construct || self.id.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionRule {
    TwoColumnPositional,
    LongestText,
    LastColumnText,
    SimilarConstructName,
    FirstNumericId,
    FirstColumnId,
}

impl CoercionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoColumnPositional => "two_column_positional",
            Self::LongestText => "longest_text",
            Self::LastColumnText => "last_column_text",
            Self::SimilarConstructName => "similar_construct_name",
            Self::FirstNumericId => "first_numeric_id",
            Self::FirstColumnId => "first_column_id",
        }
    }
}

/// One applied rename, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub rule: CoercionRule,
    pub column: usize,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct Coerced {
    pub table: Table,
    pub renames: Vec<Rename>,
}

/// Align a raw table to `roles`. Fails only when no text column can be found.
pub fn coerce(table: Table, roles: &ColumnRoles, metric: Similarity) -> Result<Coerced, ReconError> {
    let mut table = table;
    let mut renames = Vec::new();

    if let Some(found) = two_column_positional(&table, roles) {
        apply(&mut table, found, &mut renames);
    } else {
        if let Some(r) = text_column(&table, roles) {
            apply(&mut table, vec![r], &mut renames);
        }
        if let Some(r) = construct_column(&table, roles, metric) {
            apply(&mut table, vec![r], &mut renames);
        }
        if let Some(r) = id_column(&table, roles) {
            apply(&mut table, vec![r], &mut renames);
        }
    }

    if !table.has_column(&roles.text) {
        return Err(ReconError::MissingTextColumn {
            column: roles.text.clone(),
            available: table.columns().to_vec(),
        });
    }

    for r in &renames {
        log::info!("raw column '{}' used as '{}' ({})", r.from, r.to, r.rule.as_str());
    }

    Ok(Coerced { table, renames })
}

fn apply(table: &mut Table, found: Vec<Rename>, applied: &mut Vec<Rename>) {
    for r in found {
        table.rename_column(r.column, r.to.clone());
        applied.push(r);
    }
}

fn rename(table: &Table, column: usize, to: &str, rule: CoercionRule) -> Rename {
    Rename {
        rule,
        column,
        from: table.columns()[column].clone(),
        to: to.to_string(),
    }
}

fn unassigned<'a>(table: &'a Table, roles: &'a ColumnRoles) -> impl Iterator<Item = usize> + 'a {
    (0..table.width()).filter(move |&i| !roles.is_assigned(&table.columns()[i]))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Exactly two columns, id requested, neither id nor text present: read as (id, text).
pub fn two_column_positional(table: &Table, roles: &ColumnRoles) -> Option<Vec<Rename>> {
    let id = roles.id.as_deref()?;
    if table.width() != 2 || table.has_column(id) || table.has_column(&roles.text) {
        return None;
    }
    Some(vec![
        rename(table, 0, id, CoercionRule::TwoColumnPositional),
        rename(table, 1, &roles.text, CoercionRule::TwoColumnPositional),
    ])
}

/// Text absent: the text column with the longest mean value, else the last column.
pub fn text_column(table: &Table, roles: &ColumnRoles) -> Option<Rename> {
    if table.has_column(&roles.text) {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for i in unassigned(table, roles) {
        if table.column_kind(i) != ColumnKind::Text {
            continue;
        }
        let len = table.mean_text_len(i).unwrap_or(0.0);
        if best.map_or(true, |(_, b)| len > b) {
            best = Some((i, len));
        }
    }
    if let Some((i, _)) = best {
        return Some(rename(table, i, &roles.text, CoercionRule::LongestText));
    }
    let last = unassigned(table, roles).last()?;
    Some(rename(table, last, &roles.text, CoercionRule::LastColumnText))
}

/// Construct absent: adopt the column whose header closely matches the expected name.
pub fn construct_column(table: &Table, roles: &ColumnRoles, metric: Similarity) -> Option<Rename> {
    if table.has_column(&roles.construct) {
        return None;
    }
    let candidates: Vec<usize> = unassigned(table, roles).collect();
    let name = metric.best_match(
        &roles.construct,
        candidates.iter().map(|&i| table.columns()[i].as_str()),
        CONSTRUCT_NAME_CUTOFF,
    )?;
    let idx = table.column_index(name)?;
    Some(rename(table, idx, &roles.construct, CoercionRule::SimilarConstructName))
}

/// Id requested but absent: first numeric column, else the first free column.
pub fn id_column(table: &Table, roles: &ColumnRoles) -> Option<Rename> {
    let id = roles.id.as_deref()?;
    if table.has_column(id) {
        return None;
    }
    let free: Vec<usize> = unassigned(table, roles).collect();
    if let Some(&i) = free.iter().find(|&&i| table.column_kind(i) == ColumnKind::Numeric) {
        return Some(rename(table, i, id, CoercionRule::FirstNumericId));
    }
    let first = *free.first()?;
    Some(rename(table, first, id, CoercionRule::FirstColumnId))
}
