use csv::ReaderBuilder;
use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};
use tracing::{debug, trace};
use zip::ZipArchive;

use super::raw_table::RawTable;
use crate::errors::{FedTrackError, FedTrackResult};

/// Loads one named sheet out of a workbook.
pub trait TabularReader: Sync {
    fn load(&self, source: &Path, sheet: &str) -> FedTrackResult<RawTable>;
}

/// Reads workbooks exported as one CSV per sheet.
///
/// `source` is either a directory holding `<sheet>.csv` files or a `.zip`
/// archive of them. Sheet names match the file stem case-insensitively.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWorkbookReader;

impl TabularReader for CsvWorkbookReader {
    #[tracing::instrument(level = "info", skip(self, source), fields(path = %source.display()))]
    fn load(&self, source: &Path, sheet: &str) -> FedTrackResult<RawTable> {
        let data = if source.is_dir() {
            read_from_dir(source, sheet)?
        } else if source.is_file() && has_extension(source, "zip") {
            read_from_zip(source, sheet)?
        } else if source.is_file() {
            return Err(unreadable(source, "unsupported workbook format"));
        } else {
            return Err(unreadable(source, "no such file or directory"));
        };

        let table = parse_csv(sheet, data).map_err(|e| unreadable(source, e))?;
        debug!(sheet, rows = table.len(), "loaded sheet");
        Ok(table)
    }
}

fn read_from_dir(dir: &Path, sheet: &str) -> FedTrackResult<Vec<u8>> {
    let entries = fs::read_dir(dir).map_err(|e| unreadable(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| unreadable(dir, e))?.path();
        if path.is_file() && has_extension(&path, "csv") && stem_matches(&path, sheet) {
            trace!(file = %path.display(), "matched sheet file");
            return fs::read(&path).map_err(|e| unreadable(&path, e));
        }
    }
    Err(FedTrackError::SheetNotFound {
        path: dir.to_path_buf(),
        sheet: sheet.to_string(),
    })
}

fn read_from_zip(zip_path: &Path, sheet: &str) -> FedTrackResult<Vec<u8>> {
    let file = File::open(zip_path).map_err(|e| unreadable(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| unreadable(zip_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| unreadable(zip_path, format!("entry #{}: {}", i, e)))?;
        let name = entry.name().to_string();
        if !entry.is_file() || !has_extension(Path::new(&name), "csv") {
            continue;
        }
        if stem_matches(Path::new(&name), sheet) {
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .map_err(|e| unreadable(zip_path, format!("{}: {}", name, e)))?;
            return Ok(buf);
        }
    }

    Err(FedTrackError::SheetNotFound {
        path: zip_path.to_path_buf(),
        sheet: sheet.to_string(),
    })
}

/// Parse one sheet. Blank lines stay in place as all-empty rows, padded to
/// the width of the first non-blank row, so positional header and footer
/// counts keep lining up with the sheet.
fn parse_csv(sheet: &str, data: Vec<u8>) -> Result<RawTable, csv::Error> {
    let text = String::from_utf8_lossy(&data);

    let mut parsed: Vec<Option<Vec<String>>> = Vec::new();
    for chunk in split_records(&text) {
        if chunk.is_empty() {
            parsed.push(None);
            continue;
        }
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // row widths are validated by the normalizer
            .from_reader(chunk.as_bytes());
        for result in rdr.records() {
            let record = result?;
            parsed.push(Some(record.iter().map(str::to_string).collect()));
        }
    }

    let width = parsed.iter().flatten().next().map_or(1, Vec::len);
    let records = parsed
        .into_iter()
        .map(|row| row.unwrap_or_else(|| vec![String::new(); width]));
    Ok(RawTable::from_records(sheet, records.collect::<Vec<_>>()))
}

/// Split CSV text into physical records, keeping quoted line breaks inside
/// their record. The terminator after the last record does not start a row.
fn split_records(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut in_quotes = false;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if in_quotes {
            pending.push('\n');
            pending.push_str(line);
        } else {
            pending = line.to_string();
        }
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        if !in_quotes {
            out.push(std::mem::take(&mut pending));
        }
    }
    if in_quotes {
        out.push(pending);
    }
    if out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

fn stem_matches(path: &Path, sheet: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map_or(false, |stem| stem.trim().eq_ignore_ascii_case(sheet.trim()))
}

fn unreadable(path: &Path, reason: impl ToString) -> FedTrackError {
    FedTrackError::SourceUnreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
