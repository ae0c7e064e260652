//! Tabular input reader
//!
//! Reads comma- and tab-separated files, and the first worksheet of
//! spreadsheets, into [`Row`]s. Cells stay text; the validator decides what
//! they mean.

use crate::domain::{Kind, Result, Row, UploaderError};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::BTreeMap;
use std::path::Path;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl TableFormat {
    /// Detect the format from the file extension
    ///
    /// # Errors
    ///
    /// Unknown extensions are rejected.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "xls" | "xlsx" | "xlsm" | "ods" => Ok(Self::Spreadsheet),
            other => Err(UploaderError::Input(format!(
                "Unsupported table format '.{other}' for {}",
                path.display()
            ))),
        }
    }
}

/// Header cells and numbered data records of a table
struct RawTable {
    headers: Vec<String>,
    records: Vec<(u64, Vec<String>)>,
}

/// Read every data row of `path` as a row of `kind`
///
/// Columns with an empty header (spreadsheet index columns) are dropped.
/// Short rows are accepted; their trailing columns are simply absent. Only
/// the first worksheet of a spreadsheet is read.
///
/// # Errors
///
/// Returns [`UploaderError::Input`] when the file is missing, has an
/// unsupported extension, or can't be parsed.
pub fn read_table(path: impl AsRef<Path>, kind: Kind) -> Result<Vec<Row>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(UploaderError::Input(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let table = match TableFormat::from_path(path)? {
        TableFormat::Csv => read_delimited(path, b',')?,
        TableFormat::Tsv => read_delimited(path, b'\t')?,
        TableFormat::Spreadsheet => read_first_sheet(path)?,
    };

    let mut rows = Vec::new();
    for (line, cells) in table.records {
        let fields: BTreeMap<String, String> = table
            .headers
            .iter()
            .zip(cells)
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), value))
            .collect();

        if fields.values().all(|v| v.is_empty()) {
            continue;
        }

        rows.push(Row::new(kind, line, fields));
    }

    tracing::info!(
        path = %path.display(),
        kind = %kind,
        rows = rows.len(),
        "Read input table"
    );

    Ok(rows)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| UploaderError::Input(format!("Failed to open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| UploaderError::Input(format!("Failed to read header of {}: {e}", path.display())))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| UploaderError::Input(format!("Failed to read {}: {e}", path.display())))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        records.push((line, record.iter().map(str::to_string).collect()));
    }

    Ok(RawTable { headers, records })
}

fn read_first_sheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| UploaderError::Input(format!("Failed to open {}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| UploaderError::Input(format!("{} has no worksheet", path.display())))?
        .map_err(|e| UploaderError::Input(format!("Failed to read {}: {e}", path.display())))?;

    // Lines are 1-based and count from the top of the sheet
    let first_line = range.start().map(|(row, _)| u64::from(row) + 1).unwrap_or(1);
    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .map(|cells| cells.iter().map(cell_text).collect())
        .unwrap_or_default();
    let records = sheet_rows
        .enumerate()
        .map(|(index, cells)| {
            (
                first_line + index as u64 + 1,
                cells.iter().map(cell_text).collect(),
            )
        })
        .collect();

    Ok(RawTable { headers, records })
}

/// Cell as text; whole floats print without a fraction
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}
