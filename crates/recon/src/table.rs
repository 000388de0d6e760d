use std::fmt;

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A single loaded value. Readers decide the variant; the engine never
/// re-parses text except where a rule explicitly coerces it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Infer a cell from a delimited-text field: empty → Empty, numeric → number,
    /// `true`/`false` in any case → Bool.
    pub fn infer(field: &str) -> Cell {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if looks_numeric(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Cell::Float(f);
            }
        }
        Cell::Text(field.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    /// Numeric coercion: text that does not parse becomes `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if f.is_nan() => None,
            Cell::Float(f) => Some(*f),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => {
                let t = s.trim();
                if looks_numeric(t) {
                    t.parse::<f64>().ok().filter(|f| !f.is_nan())
                } else {
                    None
                }
            }
        }
    }

    /// Display text; empty cells render as "".
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Guards `f64::from_str` against words it would otherwise accept ("inf", "NaN").
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(s);
    !body.is_empty()
        && body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(n) => write!(f, "{n}"),
            Cell::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Cell::Float(_) => serializer.serialize_none(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

// ---------------------------------------------------------------------------
// Column kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Boolean,
    Empty,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Header row plus row-major cells. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build from rows, padding short rows with `Empty` and truncating long ones.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// First column with this exact header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    pub fn rename_column(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(slot) = self.columns.get_mut(idx) {
            *slot = name.into();
        }
    }

    /// Kind of a column, judged on its non-empty cells.
    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for cell in self.column(idx) {
            match cell {
                Cell::Empty => {}
                Cell::Text(_) => return ColumnKind::Text,
                Cell::Int(_) | Cell::Float(_) => {
                    kind = match kind {
                        ColumnKind::Empty | ColumnKind::Numeric => ColumnKind::Numeric,
                        // Mixed bool + number reads as a generic object column.
                        _ => return ColumnKind::Text,
                    }
                }
                Cell::Bool(_) => {
                    kind = match kind {
                        ColumnKind::Empty | ColumnKind::Boolean => ColumnKind::Boolean,
                        _ => return ColumnKind::Text,
                    }
                }
            }
        }
        kind
    }

    /// Mean display length over non-empty cells; `None` for an all-empty column.
    pub fn mean_text_len(&self, idx: usize) -> Option<f64> {
        let (total, count) = self
            .column(idx)
            .filter(|c| !c.is_empty())
            .fold((0usize, 0usize), |(t, n), c| (t + c.to_text().chars().count(), n + 1));
        (count > 0).then(|| total as f64 / count as f64)
    }
}
