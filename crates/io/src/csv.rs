// Delimited text import/export

use std::io::Read;
use std::path::Path;

use concord_recon::table::{Cell, Table};

use crate::error::IoError;
use crate::headers::header_names;

/// Read a delimited file with a header row, sniffing the delimiter.
pub fn read_delimited(path: &Path) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    log::debug!("{}: delimiter {:?}", path.display(), delimiter as char);
    table_from_str(&content, delimiter).map_err(|e| IoError::csv(path, e))
}

pub fn read_with_delimiter(path: &Path, delimiter: u8) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    table_from_str(&content, delimiter).map_err(|e| IoError::csv(path, e))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must split the header line to be viable
        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        // Lines agreeing with the header's field count, weighted by that count
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback for Excel-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::open(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::open(path, e))?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// First record is the header; every field is type-inferred.
pub fn table_from_str(content: &str, delimiter: u8) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let Some(header) = records.next().transpose()? else {
        return Ok(Table::default());
    };
    let columns = header_names(header.iter().map(String::from));

    let mut rows = Vec::new();
    for result in records {
        let record = result?;
        rows.push(record.iter().map(Cell::infer).collect());
    }
    Ok(Table::from_rows(columns, rows))
}
