// src/output.rs
//! The published CSV dataset: fixed columns, UTF-8, atomic replace.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::OutputError;
use crate::model::CanonicalRecord;

pub const COLUMNS: [&str; 8] = [
    "title",
    "summary",
    "url",
    "publishedDate",
    "country",
    "continent",
    "confidence",
    "verificationNote",
];

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write all records to a sibling temp file, then rename over `path`.
/// On any error the previous file is left as it was.
pub fn write_records(path: &Path, records: &[CanonicalRecord]) -> Result<(), OutputError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let tmp = tmp_sibling(path);

    let result = write_csv(&tmp, records);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path)(e));
    }
    info!(path = %path.display(), records = records.len(), "dataset written");
    Ok(())
}

fn write_csv(tmp: &Path, records: &[CanonicalRecord]) -> Result<(), OutputError> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(tmp)?;
    // Header written by hand so an empty dataset still has one.
    w.write_record(COLUMNS)?;
    for r in records {
        w.serialize(r)?;
    }
    w.flush().map_err(io_err(tmp))?;
    Ok(())
}

/// Parse a dataset. A leading UTF-8 BOM is tolerated; a different header is an error.
pub fn read_records(path: &Path) -> Result<Vec<CanonicalRecord>, OutputError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    parse_records(bytes.strip_prefix(BOM).unwrap_or(&bytes), path)
}

fn parse_records(data: &[u8], path: &Path) -> Result<Vec<CanonicalRecord>, OutputError> {
    let mut r = csv::ReaderBuilder::new().from_reader(data);
    let headers = r.headers()?.clone();
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(OutputError::Record {
            path: path.display().to_string(),
            row: 0,
            message: format!("unexpected header: {}", headers.iter().collect::<Vec<_>>().join(",")),
        });
    }
    let mut out = Vec::new();
    for (i, row) in r.deserialize::<CanonicalRecord>().enumerate() {
        let rec = row.map_err(|e| OutputError::Record {
            path: path.display().to_string(),
            row: i + 1,
            message: e.to_string(),
        })?;
        out.push(rec);
    }
    Ok(out)
}

/// Prior dataset for merging; a missing file means none yet.
pub fn load_prior(path: &Path) -> Result<Vec<CanonicalRecord>, OutputError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_records(path)
}
