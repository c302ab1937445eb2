use crate::error::Result;
use crate::types::{Cell, Table};

/// Read comma-separated bytes; the first record is the header row.
///
/// Every value stays text. Fully blank lines are skipped.
pub fn read_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(Cell::from).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_and_padding() {
        let table = read_table("\u{feff} A ,B\n1\n\n2,3\n".as_bytes()).unwrap();
        assert_eq!(table.headers(), &["A".to_string(), "B".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![Cell::from("1"), Cell::Empty]);
    }
}
