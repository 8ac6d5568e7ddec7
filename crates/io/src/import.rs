// Spreadsheet and delimited-text ingestion
//
// Import is a pure transform: bytes in, a trimmed and normalized Grid out.
// The caller owns persistence. Validation (extension, size window) happens
// before any byte of the file is parsed.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use gridhub_engine::cell::{CellValue, DATETIME_ENCODING};
use gridhub_engine::grid::{Grid, Row};

use crate::error::LoadError;

/// Accepted upload extensions (lower-case, dot included).
pub const VALID_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".xlsm", ".xlsb", ".csv", ".ods"];

/// Uploads above this are rejected outright.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Uploads below this look empty or corrupt.
pub const MIN_FILE_SIZE: u64 = 1024;

/// Result of a successful load. Sheet name and count feed the upload
/// notification.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub grid: Grid,
    pub sheet_name: String,
    pub sheet_count: usize,
}

/// The lower-cased extension of `file_name` including the dot, or an empty
/// string when there is none.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => file_name[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Load a spreadsheet or CSV file from disk.
pub fn load_path(path: &Path) -> Result<LoadedSheet, LoadError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let extension = validate_extension(file_name)?;

    let size = std::fs::metadata(path)
        .map_err(|e| LoadError::Io(e.to_string()))?
        .len();
    validate_size(size)?;

    let bytes = std::fs::read(path).map_err(|e| LoadError::Io(e.to_string()))?;
    load_validated(&bytes, &extension)
}

/// Load from an in-memory buffer, validating against `file_name`.
pub fn load_bytes(bytes: &[u8], file_name: &str) -> Result<LoadedSheet, LoadError> {
    let extension = validate_extension(file_name)?;
    validate_size(bytes.len() as u64)?;
    load_validated(bytes, &extension)
}

fn validate_extension(file_name: &str) -> Result<String, LoadError> {
    let extension = file_extension(file_name);
    if VALID_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(LoadError::InvalidFileType { extension })
    }
}

fn validate_size(size: u64) -> Result<(), LoadError> {
    if size > MAX_FILE_SIZE {
        return Err(LoadError::FileTooLarge { size });
    }
    if size < MIN_FILE_SIZE {
        return Err(LoadError::FileTooSmall { size });
    }
    Ok(())
}

fn load_validated(bytes: &[u8], extension: &str) -> Result<LoadedSheet, LoadError> {
    let loaded = if extension == ".csv" {
        import_csv(bytes)?
    } else {
        import_workbook(bytes)?
    };
    tracing::info!(
        sheet = %loaded.sheet_name,
        rows = loaded.grid.row_count(),
        cols = loaded.grid.width(),
        "imported file"
    );
    Ok(loaded)
}

fn import_workbook(bytes: &[u8]) -> Result<LoadedSheet, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| LoadError::ParseFailure(format!("failed to open workbook: {e}")))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(LoadError::NoSheetsFound);
    }

    // The sheet whose declared range covers the most cells wins; ties keep
    // the first-seen sheet.
    let mut selected: Option<(String, Range<Data>)> = None;
    let mut max_cells = 0usize;
    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| LoadError::ParseFailure(format!("failed to read sheet '{name}': {e}")))?;
        let (height, width) = range.get_size();
        let cells = height * width;
        if selected.is_none() || cells > max_cells {
            max_cells = cells;
            selected = Some((name.clone(), range));
        }
    }
    let Some((sheet_name, range)) = selected else {
        return Err(LoadError::NoSheetsFound);
    };

    let mut rows: Vec<Row> = Vec::new();
    for row in range.rows() {
        // Fully blank rows are dropped at extraction; the trim pass below
        // only handles trailing rows that merely look empty (sentinels).
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        rows.push(row.iter().map(cell_from_data).collect());
    }

    Ok(LoadedSheet {
        grid: Grid::trimmed(rows).normalized(),
        sheet_name,
        sheet_count: sheet_names.len(),
    })
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Error cells keep their display text; the normalizer tags them.
        Data::Error(e) => CellValue::Text(format!("{e}")),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => CellValue::DateTime(parsed),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, DATETIME_ENCODING)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn import_csv(bytes: &[u8]) -> Result<LoadedSheet, LoadError> {
    let content = decode_utf8(bytes);
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Row> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoadError::ParseFailure(e.to_string()))?;
        let row: Row = record.iter().map(CellValue::from_raw_text).collect();
        if row.iter().all(|cell| matches!(cell, CellValue::Empty)) {
            continue;
        }
        rows.push(row);
    }

    Ok(LoadedSheet {
        grid: Grid::trimmed(rows).normalized(),
        sheet_name: "Sheet1".to_string(),
        sheet_count: 1,
    })
}

/// Decode bytes as UTF-8, falling back to Windows-1252 (common for
/// Excel-exported CSVs).
fn decode_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across
/// the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per
/// line. The delimiter that produces the most consistent field count
/// (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
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

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (number of lines with same field count as line 1) * field_count
        // Higher field count breaks ties — more columns = more likely real delimiter
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// A CSV body comfortably above the 1 KB floor.
    fn sample_csv(rows: usize) -> String {
        let mut content = String::from("Name,Amt,Active\n");
        for i in 0..rows {
            content.push_str(&format!("item-{i},{}.5,TRUE\n", 100_000 + i));
        }
        content
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = load_bytes(b"hello", "data.txt").unwrap_err();
        match err {
            LoadError::InvalidFileType { extension } => assert_eq!(extension, ".txt"),
            other => panic!("expected InvalidFileType, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_extensionless_name() {
        assert!(matches!(
            load_bytes(b"hello", "README").unwrap_err(),
            LoadError::InvalidFileType { .. }
        ));
    }

    #[test]
    fn test_rejects_tiny_file_before_parsing() {
        // Garbage bytes, but the size check fires first.
        assert!(matches!(
            load_bytes(b"not a spreadsheet", "small.xlsx").unwrap_err(),
            LoadError::FileTooSmall { .. }
        ));
    }

    #[test]
    fn test_rejects_oversized_file_before_parsing() {
        let bytes = vec![0u8; (MAX_FILE_SIZE + 1) as usize];
        assert!(matches!(
            load_bytes(&bytes, "huge.csv").unwrap_err(),
            LoadError::FileTooLarge { .. }
        ));
    }

    #[test]
    fn test_malformed_workbook_is_parse_failure() {
        let bytes = vec![0xABu8; 2048];
        assert!(matches!(
            load_bytes(&bytes, "broken.xlsx").unwrap_err(),
            LoadError::ParseFailure(_)
        ));
    }

    #[test]
    fn test_csv_import_types_and_trims() {
        let mut content = sample_csv(80);
        // Trailing noise: sentinel-only and blank rows disappear.
        content.push_str("N/A,,\n,,\n");
        let loaded = load_bytes(content.as_bytes(), "data.csv").unwrap();

        let grid = loaded.grid;
        assert_eq!(grid.headers().len(), 3);
        assert_eq!(grid.data_rows().len(), 80);
        assert_eq!(grid.cell(1, 0), &CellValue::Text("item-0".to_string()));
        assert_eq!(grid.cell(1, 1), &CellValue::Number(100_000.5));
        assert_eq!(grid.cell(1, 2), &CellValue::Bool(true));
    }

    #[test]
    fn test_csv_semicolon_delimiter_sniffed() {
        let mut content = String::from("Name;Amt\n");
        for i in 0..150 {
            content.push_str(&format!("item-{i};{i}.25\n"));
        }
        let loaded = load_bytes(content.as_bytes(), "data.csv").unwrap();
        assert_eq!(loaded.grid.headers().len(), 2);
        assert_eq!(loaded.grid.cell(1, 1), &CellValue::Number(0.25));
    }

    #[test]
    fn test_sniff_delimiters() {
        assert_eq!(sniff_delimiter("Name,Age\nAlice,30\n"), b',');
        assert_eq!(sniff_delimiter("Name;Age\nAlice;30\n"), b';');
        assert_eq!(sniff_delimiter("Name\tAge\nAlice\t30\n"), b'\t');
        assert_eq!(sniff_delimiter("Name|Age\nAlice|30\n"), b'|');
    }

    #[test]
    fn test_load_path_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, sample_csv(100)).unwrap();

        let loaded = load_path(&path).unwrap();
        assert_eq!(loaded.sheet_name, "Sheet1");
        assert_eq!(loaded.sheet_count, 1);
        assert_eq!(loaded.grid.data_rows().len(), 100);
    }

    #[test]
    fn test_densest_sheet_wins() {
        use rust_xlsxwriter::Workbook;

        let dir = tempdir().unwrap();
        let path = dir.path().join("multi.xlsx");

        let mut workbook = Workbook::new();
        let small = workbook.add_worksheet();
        small.set_name("Small").unwrap();
        small.write_string(0, 0, "only").unwrap();
        let big = workbook.add_worksheet();
        big.set_name("Big").unwrap();
        big.write_string(0, 0, "Name").unwrap();
        big.write_string(0, 1, "Amt").unwrap();
        for r in 1..20u32 {
            big.write_string(r, 0, &format!("row{r}")).unwrap();
            big.write_number(r, 1, r as f64 + 0.5).unwrap();
        }
        workbook.save(&path).unwrap();

        let loaded = load_path(&path).unwrap();
        assert_eq!(loaded.sheet_name, "Big");
        assert_eq!(loaded.sheet_count, 2);
        assert_eq!(loaded.grid.data_rows().len(), 19);
        assert_eq!(loaded.grid.cell(1, 1), &CellValue::Number(1.5));
    }

    #[test]
    fn test_xlsx_dates_materialize() {
        use chrono::NaiveDate;
        use rust_xlsxwriter::{Format, Workbook};

        let dir = tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "When").unwrap();
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        sheet
            .write_datetime_with_format(1, 0, &stamp, &date_format)
            .unwrap();
        workbook.save(&path).unwrap();

        let loaded = load_path(&path).unwrap();
        assert_eq!(loaded.grid.cell(1, 0), &CellValue::DateTime(stamp));
    }
}
