//! Excel workbook reader built on calamine.
//!
//! Only the first worksheet is read. Its first non-empty row is the header; blank
//! rows below it are skipped. Cell types survive the trip so that unused columns
//! can be written back unchanged.

use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

use crate::error::{Result, SamplerError};
use crate::types::{Cell, Table};

pub fn read_table(bytes: &[u8]) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SamplerError::EmptyInput("workbook has no worksheets".to_string()))??;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(header) => header,
        None => return Ok(Table::new(Vec::new())),
    };
    let headers = header
        .iter()
        .map(|c| to_cell(c).key().trim().to_string())
        .collect();

    let mut table = Table::new(headers);
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        table.push_row(row.iter().map(to_cell).collect());
    }
    Ok(table)
}

pub(crate) fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(to_cell(&Data::Int(42)), Cell::Number(42.0));
        assert_eq!(to_cell(&Data::String(String::new())), Cell::Empty);
        assert_eq!(to_cell(&Data::String("BEER".into())), Cell::from("BEER"));
        assert_eq!(to_cell(&Data::Bool(true)), Cell::Bool(true));
        assert_eq!(to_cell(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn test_iso_and_error_cells_become_text() {
        assert_eq!(
            to_cell(&Data::DateTimeIso("2024-03-01T09:30:00".into())),
            Cell::from("2024-03-01T09:30:00")
        );
        assert_eq!(to_cell(&Data::DurationIso("PT1H".into())), Cell::from("PT1H"));
        assert_eq!(to_cell(&Data::Error(calamine::CellErrorType::Div0)), Cell::from("#DIV/0!"));
    }
}
