// File I/O: workbook and delimited readers, run artifacts, table rendering

pub mod artifacts;
pub mod csv;
pub mod error;
pub mod headers;
pub mod render;
pub mod xlsx;

use std::path::Path;

use concord_recon::config::SheetSelector;
use concord_recon::table::Table;

pub use error::IoError;

/// Spreadsheet extensions handled by calamine.
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Read a table, choosing the reader from the file extension.
///
/// The sheet selector only applies to workbooks; `.tsv` forces a tab delimiter
/// and other delimited files are sniffed.
pub fn read_table(path: &Path, sheet: &SheetSelector) -> Result<Table, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match ext.as_str() {
        e if WORKBOOK_EXTENSIONS.contains(&e) => xlsx::read_sheet(path, sheet)?,
        "tsv" => csv::read_with_delimiter(path, b'\t')?,
        "csv" | "txt" => csv::read_delimited(path)?,
        _ => {
            return Err(IoError::Unsupported {
                path: path.display().to_string(),
                expected: ".xlsx, .xlsm, .xls, .xlsb, .ods, .csv, .tsv or .txt",
            })
        }
    };
    log::info!(
        "read {} ({} rows x {} columns)",
        path.display(),
        table.len(),
        table.width()
    );
    Ok(table)
}
