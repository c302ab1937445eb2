use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet};
use std::path::{Path, PathBuf};

use crate::constants::{CATEGORY_SUMMARY_SHEET, FINAL_SAMPLE_SHEET, USER_PROFILE_SUMMARY_SHEET};
use crate::error::{Result, SamplerError};
use crate::pipeline::processing::Summary;
use crate::types::{Cell, Table};

use super::{summary_headers, write_atomically, Report, ReportSink};

/// One workbook with a worksheet per report section
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    /// Render the workbook in memory
    pub fn render(report: &Report<'_>) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        let sheet = workbook.add_worksheet();
        sheet.set_name(FINAL_SAMPLE_SHEET)?;
        write_table(sheet, report.final_sample, &header, &datetime)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(CATEGORY_SUMMARY_SHEET)?;
        write_summary(sheet, report.category_summary, &header)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(USER_PROFILE_SUMMARY_SHEET)?;
        write_summary(sheet, report.user_profile_summary, &header)?;

        Ok(workbook.save_to_buffer()?)
    }
}

impl ReportSink for XlsxExporter {
    fn write(&self, report: &Report<'_>, path: &Path) -> Result<Vec<PathBuf>> {
        let bytes = Self::render(report)?;
        write_atomically(path, &bytes)?;
        Ok(vec![path.to_path_buf()])
    }
}

fn position(row: usize, col: usize) -> Result<(RowNum, ColNum)> {
    match (RowNum::try_from(row), ColNum::try_from(col)) {
        (Ok(r), Ok(c)) => Ok((r, c)),
        _ => Err(SamplerError::Export {
            message: format!("cell ({row}, {col}) is outside the worksheet"),
        }),
    }
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], format: &Format) -> Result<()> {
    for (col, name) in headers.iter().enumerate() {
        let (r, c) = position(0, col)?;
        sheet.write_string_with_format(r, c, *name, format)?;
    }
    Ok(())
}

fn write_table(sheet: &mut Worksheet, table: &Table, header: &Format, datetime: &Format) -> Result<()> {
    let headers: Vec<&str> = table.headers().iter().map(String::as_str).collect();
    write_headers(sheet, &headers, header)?;

    for (i, row) in table.rows().iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let (r, c) = position(i + 1, col)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::DateTime(dt) => {
                    sheet.write_datetime_with_format(r, c, dt, datetime)?;
                }
            }
        }
    }
    Ok(())
}

fn write_summary(sheet: &mut Worksheet, summary: &Summary, header: &Format) -> Result<()> {
    write_headers(sheet, &summary_headers(summary), header)?;

    for (i, row) in summary.rows.iter().enumerate() {
        let (r, _) = position(i + 1, 0)?;
        sheet.write_string(r, 0, &row.key)?;
        sheet.write_number(r, 1, row.sample_count as f64)?;
        sheet.write_number(r, 2, row.total_count as f64)?;
        // Undefined ratios stay blank
        if row.ratio.is_finite() {
            sheet.write_number(r, 3, row.ratio)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::{SummaryDimension, SummaryRow};
    use calamine::{Data, Reader, Xlsx};
    use std::io::Cursor;

    fn summary(dimension: SummaryDimension, header: &str) -> Summary {
        Summary {
            dimension,
            key_header: header.to_string(),
            rows: vec![
                SummaryRow { key: "BEER".into(), sample_count: 1, total_count: 4, ratio: 0.25 },
                SummaryRow { key: "VOID".into(), sample_count: 0, total_count: 0, ratio: f64::NAN },
            ],
        }
    }

    #[test]
    fn test_render_produces_three_named_sheets() {
        let mut sample = Table::new(vec!["User Profile".into(), "External Code".into(), "Flag".into()]);
        sample.push_row(vec![Cell::from("alice"), Cell::Number(123.0), Cell::Bool(true)]);
        let category = summary(SummaryDimension::Category, "Module");
        let users = summary(SummaryDimension::UserProfile, "User Profile");
        let report = Report {
            final_sample: &sample,
            category_summary: &category,
            user_profile_summary: &users,
        };

        let bytes = XlsxExporter::render(&report).unwrap();
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();

        assert_eq!(
            workbook.sheet_names(),
            vec!["Final Sample", "Category Summary", "User Profile Summary"]
        );

        let final_sample = workbook.worksheet_range("Final Sample").unwrap();
        assert_eq!(final_sample.get((0, 1)), Some(&Data::String("External Code".into())));
        assert_eq!(final_sample.get((1, 1)), Some(&Data::Float(123.0)));
        assert_eq!(final_sample.get((1, 2)), Some(&Data::Bool(true)));

        let categories = workbook.worksheet_range("Category Summary").unwrap();
        let header: Vec<String> = categories.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(header, vec!["Module", "Sample Count", "Total Volume", "Percentage"]);
        assert_eq!(categories.get((1, 3)), Some(&Data::Float(0.25)));
        // NaN ratio left blank
        assert!(matches!(categories.get((2, 3)), None | Some(Data::Empty)));
    }
}
