// Grid export: XLSX (presentation snapshot) and CSV
//
// Callers pass header + currently visible data rows, so exports always
// reflect active filters and search.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use gridhub_engine::cell::CellValue;
use gridhub_engine::grid::Row;

use crate::error::ExportError;

/// Sheet name used for the spreadsheet form.
const EXPORT_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => ".xlsx",
            ExportFormat::Csv => ".csv",
        }
    }
}

/// Derive the download name from the uploaded name: extension replaced,
/// `_export` inserted before it.
pub fn export_file_name(original: &str, format: ExportFormat) -> String {
    let base = match original.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < original.len() => &original[..idx],
        _ => original,
    };
    format!("{base}_export{}", format.extension())
}

/// Write `rows` (header first, then visible data rows) to `path`.
pub fn export_rows(rows: &[Row], format: ExportFormat, path: &Path) -> Result<(), ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }
    match format {
        ExportFormat::Xlsx => export_xlsx(rows, path),
        ExportFormat::Csv => export_csv(rows, path),
    }?;
    tracing::info!(path = %path.display(), rows = rows.len(), "exported file");
    Ok(())
}

fn export_xlsx(rows: &[Row], path: &Path) -> Result<(), ExportError> {
    let fail = |e: rust_xlsxwriter::XlsxError| ExportError::Failure(e.to_string());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET_NAME).map_err(fail)?;

    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (r, row) in rows.iter().enumerate() {
        let r = r as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s).map_err(fail)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(r, c, *n).map_err(fail)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b).map_err(fail)?;
                }
                CellValue::DateTime(dt) => {
                    worksheet
                        .write_datetime_with_format(r, c, dt, &date_format)
                        .map_err(fail)?;
                }
            }
        }
    }

    workbook.save(path).map_err(fail)
}

fn export_csv(rows: &[Row], path: &Path) -> Result<(), ExportError> {
    // Rows may be variable width (short rows carry no trailing padding),
    // so the writer must accept uneven record lengths.
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExportError::Io(e.to_string()))?;

    for row in rows {
        let record: Vec<String> = row.iter().map(CellValue::to_display_string).collect();
        writer
            .write_record(&record)
            .map_err(|e| ExportError::Failure(e.to_string()))?;
    }

    writer.flush().map_err(|e| ExportError::Io(e.to_string()))
}
