use crate::error::ReconError;
use crate::table::{Cell, Table};

/// Pair every raw entity with every construct.
///
/// Projects `raw` to `(id_col, text_col)` and cross-joins it with
/// `constructs`, adding `construct_col`. K entities × C constructs give
/// K·C rows, entity-major.
pub fn expand(
    raw: &Table,
    constructs: &[String],
    id_col: &str,
    text_col: &str,
    construct_col: &str,
) -> Result<Table, ReconError> {
    let missing = |column: &str| ReconError::MissingColumn {
        table: "raw".into(),
        column: column.into(),
    };
    let id_idx = raw.column_index(id_col).ok_or_else(|| missing(id_col))?;
    let text_idx = raw.column_index(text_col).ok_or_else(|| missing(text_col))?;

    let mut out = Table::new(vec![
        id_col.to_string(),
        text_col.to_string(),
        construct_col.to_string(),
    ]);
    for record in raw.rows() {
        for construct in constructs {
            out.push_row(vec![
                record[id_idx].clone(),
                record[text_idx].clone(),
                Cell::Text(construct.clone()),
            ]);
        }
    }
    Ok(out)
}
