//! Canonical forms used as merge and lookup keys.
//!
//! Two names with the same canonical key are the same construct; two ids with
//! the same canonical id are the same entity. Both functions are total.

use crate::table::Cell;

/// Ids within this distance of an integer are treated as that integer.
pub const ID_INT_TOL: f64 = 1e-9;

/// Canonicalize a construct or column name so superficial variants compare equal:
/// `&` vs `and`, hyphens, case, punctuation, repeated whitespace.
pub fn canonicalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let expanded = lowered.replace('&', " and ").replace('-', " ");
    let kept: String = expanded
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical key of a cell's display text. Empty cells give "".
pub fn canonicalize_cell(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        other => canonicalize(&other.to_text()),
    }
}

/// Canonical string id for merging, or `None` for a missing id.
///
/// Integer-valued numbers (including `"12345.0"` text) become `"12345"`;
/// anything else is kept as its trimmed text.
pub fn normalize_id(value: &Cell) -> Option<String> {
    match value {
        Cell::Empty => None,
        Cell::Int(i) => Some(i.to_string()),
        Cell::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Cell::Float(f) => {
            if f.is_nan() {
                return None;
            }
            Some(integral_string(*f).unwrap_or_else(|| f.to_string()))
        }
        Cell::Text(s) => {
            let trimmed = s.trim();
            if let Ok(f) = trimmed.parse::<f64>() {
                if let Some(int) = integral_string(f) {
                    return Some(int);
                }
            }
            Some(strip_zero_fraction(trimmed).unwrap_or(trimmed).to_string())
        }
    }
}

/// Integer rendering of `f` when it is finite and within tolerance of an integer.
fn integral_string(f: f64) -> Option<String> {
    if !f.is_finite() {
        return None;
    }
    let r = f.round();
    if (f - r).abs() >= ID_INT_TOL {
        return None;
    }
    if r.abs() < i64::MAX as f64 {
        Some((r as i64).to_string())
    } else {
        Some(format!("{r:.0}"))
    }
}

/// `"500.00"` → `Some("500")`; anything not shaped `digits.zeros` → `None`.
fn strip_zero_fraction(s: &str) -> Option<&str> {
    let (int, frac) = s.split_once('.')?;
    let int_ok = !int.is_empty() && int.chars().all(|c| c.is_ascii_digit());
    let frac_ok = !frac.is_empty() && frac.chars().all(|c| c == '0');
    (int_ok && frac_ok).then_some(int)
}
