//! Spreadsheet rendering: rows → single-sheet `.xlsx`.
//!
//! Row 0 holds the column titles in schema order. Numbers are written as
//! numbers and strings as strings; nulls and missing keys stay blank. Any
//! nested value that survived tabulation is written as compact JSON text so
//! nothing is silently lost.

use crate::error::ExtractError;
use crate::output::Row;
use crate::pipeline::tabulate::COLUMNS;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

pub const SHEET_NAME: &str = "Entry Summary";

/// Render rows to an in-memory workbook.
///
/// Fails with [`ExtractError::NothingToExport`] when `rows` is empty.
pub fn workbook_bytes(rows: &[Row]) -> Result<Vec<u8>, ExtractError> {
    if rows.is_empty() {
        return Err(ExtractError::NothingToExport);
    }
    build_workbook(rows).map_err(|e| ExtractError::SpreadsheetFailed(e.to_string()))
}

fn build_workbook(rows: &[Row]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, (_, title)) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, (key, _)) in COLUMNS.iter().enumerate() {
            if let Some(value) = row.get(*key) {
                write_cell(sheet, r, col as u16, value)?;
            }
        }
    }

    debug!("Rendered {} rows x {} columns", rows.len(), COLUMNS.len());
    workbook.save_to_buffer()
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                sheet.write_number(row, col, f)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string())?;
            }
        },
        Value::String(s) if s.is_empty() => {}
        Value::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        nested => {
            sheet.write_string(row, col, nested.to_string())?;
        }
    }
    Ok(())
}

/// Render rows and write the workbook to `path`.
///
/// Parent directories are created. The file is written to a sibling temp
/// path and renamed into place, so readers never see a partial workbook.
pub async fn write_workbook(rows: &[Row], path: &Path) -> Result<(), ExtractError> {
    let bytes = workbook_bytes(rows)?;
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_rows_are_rejected() {
        assert!(matches!(workbook_bytes(&[]), Err(ExtractError::NothingToExport)));
    }

    #[test]
    fn workbook_is_a_zip_container() {
        let rows = vec![row(json!({
            "entry_number": "ABC-1",
            "entered_value": 1200.5,
            "hts_rate": "FREE",
            "pack_qty_1": {"value": 3},
            "relationship": null
        }))];
        let bytes = workbook_bytes(&rows).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("entry.xlsx");
        write_workbook(&[row(json!({"hts_code": "1"}))], &path).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("xlsx.tmp").exists());
    }

    #[tokio::test]
    async fn failed_render_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        assert!(write_workbook(&[], &path).await.is_err());
        assert!(!path.exists());
    }
}
