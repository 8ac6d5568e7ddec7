use std::fmt;

/// Errors from file ingestion. Validation failures (type and size) are
/// detected before any byte of the file is parsed.
#[derive(Debug)]
pub enum LoadError {
    /// Extension not in the accepted set.
    InvalidFileType { extension: String },
    /// File exceeds the 50 MB ceiling.
    FileTooLarge { size: u64 },
    /// File is under the 1 KB floor (looks empty or corrupt).
    FileTooSmall { size: u64 },
    /// Workbook parsed but declares zero sheets.
    NoSheetsFound,
    /// Malformed bytes (catch-all around the decode step).
    ParseFailure(String),
    /// The file could not be read at all.
    Io(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFileType { extension } => {
                write!(
                    f,
                    "invalid file type '{extension}': expected .xlsx, .xls, .xlsm, .xlsb, .csv, or .ods"
                )
            }
            Self::FileTooLarge { size } => {
                write!(
                    f,
                    "file too large: {:.1}MB exceeds the 50MB limit",
                    *size as f64 / (1024.0 * 1024.0)
                )
            }
            Self::FileTooSmall { size } => {
                write!(f, "file too small: {size} bytes; the file looks empty or corrupt")
            }
            Self::NoSheetsFound => write!(f, "no sheets found in the file"),
            Self::ParseFailure(msg) => write!(f, "failed to parse file: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Errors from serializing the grid back out.
#[derive(Debug)]
pub enum ExportError {
    /// Nothing loaded; there is no grid to export.
    NoData,
    /// The writer rejected the data.
    Failure(String),
    /// The output file could not be written.
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data to export"),
            Self::Failure(msg) => write!(f, "export failed: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}
