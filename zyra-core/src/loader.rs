//! Request file discovery and loading.
use std::path::{Path, PathBuf};
use tracing::*;
use walkdir::WalkDir;

use crate::{model::Document, parser, Error, Result};

/// Extension of request files.
pub const EXTENSION: &str = "zyra";

/// Request files under `path` in scan order.
///
/// A file path yields itself. A directory is walked recursively, entries sorted by file
/// name at every level, keeping only `*.zyra` files.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io {
            path: e.path().unwrap_or(path).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() && is_request_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    debug!("discovered {} request files under {}", files.len(), path.display());
    Ok(files)
}

fn is_request_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION)
}

/// Read and parse one request file.
pub fn load_document(path: &Path) -> Result<Document> {
    let src = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parser::parse_document(&src).map_err(|e| Error::Parse {
        file: path.to_path_buf(),
        line: e.line,
        message: e.message,
    })
}
