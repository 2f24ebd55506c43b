//! Spreadsheet rendering and password-protected packaging of a merged table.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use super::merge::MergedTable;

/// Name of the spreadsheet inside every archive.
pub const ARCHIVE_ENTRY: &str = "report.xlsx";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to render spreadsheet: {0}")]
    Spreadsheet(#[from] XlsxError),

    #[error("table too large for a worksheet: {0}")]
    TooLarge(String),

    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive task panicked: {0}")]
    Join(String),
}

/// Renders the table into an in-memory XLSX workbook with a bold header row.
pub fn render_workbook(table: &MergedTable) -> Result<Vec<u8>, ArchiveError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, column_index(col)?, name, &header)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let row_index = u32::try_from(index + 1)
            .map_err(|_| ArchiveError::TooLarge(format!("{} rows", table.rows.len())))?;
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row_index, column_index(col)?, value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(col: usize) -> Result<u16, ArchiveError> {
    u16::try_from(col).map_err(|_| ArchiveError::TooLarge(format!("{} columns", col + 1)))
}

/// Writes `content` as the single AES-256 encrypted entry of a zip file.
///
/// The archive is built next to `dest` under a `.part` suffix and renamed
/// into place once complete, so a reader never sees a half-written file.
pub fn write_encrypted_zip(
    dest: &Path,
    content: &[u8],
    password: &str,
    compression_level: i64,
) -> Result<(), ArchiveError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let partial = partial_path(dest);
    let result = (|| -> Result<(), ArchiveError> {
        let file = std::fs::File::create(&partial)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level))
            .with_aes_encryption(AesMode::Aes256, password);

        zip.start_file(ARCHIVE_ENTRY, options)?;
        zip.write_all(content)?;
        zip.finish()?.sync_all()?;
        std::fs::rename(&partial, dest)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Renders and packages the table off the async runtime.
pub async fn build_archive(
    table: MergedTable,
    dest: PathBuf,
    password: String,
    compression_level: i64,
) -> Result<u64, ArchiveError> {
    tokio::task::spawn_blocking(move || {
        let workbook = render_workbook(&table)?;
        write_encrypted_zip(&dest, &workbook, &password, compression_level)?;
        Ok(std::fs::metadata(&dest)?.len())
    })
    .await
    .map_err(|e| ArchiveError::Join(e.to_string()))?
}
