// Excel import (xlsx, xlsm, xls, xlsb, ods) via calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use concord_recon::config::SheetSelector;
use concord_recon::table::{Cell, Table};

use crate::error::IoError;
use crate::headers::header_names;

/// Read one sheet; its first row is the header.
pub fn read_sheet(path: &Path, selector: &SheetSelector) -> Result<Table, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::open(path, e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let sheet_err = |message: String| IoError::Sheet {
        path: path.display().to_string(),
        sheet: selector.to_string(),
        message,
    };

    let name = match selector {
        SheetSelector::Index(i) => sheet_names.get(*i).cloned().ok_or_else(|| {
            sheet_err(format!("workbook has {} sheet(s)", sheet_names.len()))
        })?,
        SheetSelector::Name(n) => {
            if !sheet_names.iter().any(|s| s == n) {
                return Err(sheet_err(format!(
                    "not found; available: {}",
                    sheet_names.join(", ")
                )));
            }
            n.clone()
        }
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| sheet_err(e.to_string()))?;
    log::debug!("{}: reading sheet '{name}' ({:?})", path.display(), range.get_size());

    // Data may not begin at A1; leading blank columns still count as columns.
    let (_, start_col) = range.start().unwrap_or((0, 0));
    let lead = start_col as usize;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let columns = header_names(
        std::iter::repeat(String::new())
            .take(lead)
            .chain(header.iter().map(header_text)),
    );

    let body = rows
        .map(|row| {
            std::iter::repeat(Cell::Empty)
                .take(lead)
                .chain(row.iter().map(to_cell))
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(Table::from_rows(columns, body))
}

fn header_text(cell: &Data) -> String {
    match to_cell(cell) {
        Cell::Empty => String::new(),
        other => other.to_text(),
    }
}

/// Whole-number floats become integers, the way spreadsheets display them.
pub fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => Cell::Int(*n as i64),
        Data::Float(n) => Cell::Float(*n),
        Data::Int(n) => Cell::Int(*n),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
