//! The aggregate table and its CSV/XLSX renderings.
//!
//! Every cell is written as text so spreadsheet tools keep long numeric
//! identifiers intact instead of switching to exponent notation.
use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;

use crate::batch_orchestrator::OutputRow;
use crate::error::Result;

pub const FILENAME_COLUMN: &str = "filename";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OcrTable {
    /// Lays rows out as `[filename, <roi names..>]`; absent fields become empty cells.
    pub fn from_rows(roi_names: &[String], rows: &[OutputRow]) -> Self {
        let columns = std::iter::once(FILENAME_COLUMN.to_string())
            .chain(roi_names.iter().cloned())
            .collect();
        let rows = rows
            .iter()
            .map(|row| {
                std::iter::once(row.filename.clone())
                    .chain(roi_names.iter().map(|name| row.get(name).to_string()))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_xlsx(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (row_index, cells) in std::iter::once(&self.columns).chain(&self.rows).enumerate() {
            let row_index = u32::try_from(row_index).unwrap_or(u32::MAX);
            for (col_index, cell) in cells.iter().enumerate() {
                let col_index = u16::try_from(col_index).unwrap_or(u16::MAX);
                worksheet.write_string(row_index, col_index, cell.as_str())?;
            }
        }
        workbook.save(path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub output_dir: PathBuf,
    pub csv_name: String,
    pub xlsx_name: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            csv_name: "ocr_result.csv".to_string(),
            xlsx_name: "ocr_result.xlsx".to_string(),
        }
    }
}

impl TableOptions {
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.csv_name)
    }

    pub fn xlsx_path(&self) -> PathBuf {
        self.output_dir.join(&self.xlsx_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    pub csv_path: PathBuf,
    pub xlsx_path: PathBuf,
    pub rows: usize,
}

/// Writes both renderings, creating the output directory when needed.
pub fn write_outputs(table: &OcrTable, options: &TableOptions) -> Result<WrittenTable> {
    fs::create_dir_all(&options.output_dir)?;
    let csv_path = options.csv_path();
    let xlsx_path = options.xlsx_path();

    table.write_csv(&csv_path)?;
    table.write_xlsx(&xlsx_path)?;
    log::info!(
        "[TABLE] wrote {} rows to {} and {}",
        table.len(),
        csv_path.display(),
        xlsx_path.display()
    );

    Ok(WrittenTable {
        csv_path,
        xlsx_path,
        rows: table.len(),
    })
}
