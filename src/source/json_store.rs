use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{QueryCursor, RecordQuery, RecordStore, ResultPage, StoredOrder, page_stored_orders};
use crate::constants::storage::EXPORT_FILE_EXTENSION;
use crate::errors::PipelineError;
use crate::types::StoreId;

/// Record store backed by JSON exports.
///
/// `root` is either a single file holding a JSON array of `StoredOrder`
/// objects, or a directory scanned recursively for `*.json` files. Files are
/// read in path order, rows in file order, so enumeration order is stable for
/// an unchanged export.
pub struct JsonExportStore {
    id: StoreId,
    root: PathBuf,
    rows: Vec<StoredOrder>,
}

impl JsonExportStore {
    /// Load every export under `root`.
    ///
    /// A missing root or an unreadable/invalid file is a fatal input error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        let id = format!("export:{}", root.display());
        let files = export_files(&id, &root)?;
        let mut rows = Vec::new();
        for path in &files {
            let loaded = read_export_file(&id, path)?;
            debug!(
                store_id = %id,
                path = %path.display(),
                rows = loaded.len(),
                "loaded export file"
            );
            rows.extend(loaded);
        }
        Ok(Self { id, root, rows })
    }

    /// Path the store was opened from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of loaded rows, matching or not.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when no rows were loaded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RecordStore for JsonExportStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&QueryCursor>,
        limit: usize,
    ) -> Result<ResultPage, PipelineError> {
        page_stored_orders(&self.id, &self.rows, query, cursor, limit)
    }
}

fn export_files(store_id: &str, root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(PipelineError::FatalInput {
            store_id: store_id.to_string(),
            reason: format!("export path {} does not exist", root.display()),
        });
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| PipelineError::FatalInput {
            store_id: store_id.to_string(),
            reason: format!("failed to scan {}: {err}", root.display()),
        })?;
        let is_export = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == EXPORT_FILE_EXTENSION);
        if is_export {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn read_export_file(store_id: &str, path: &Path) -> Result<Vec<StoredOrder>, PipelineError> {
    let bytes = fs::read(path).map_err(|err| PipelineError::FatalInput {
        store_id: store_id.to_string(),
        reason: format!("failed to read {}: {err}", path.display()),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| PipelineError::FatalInput {
        store_id: store_id.to_string(),
        reason: format!("invalid export {}: {err}", path.display()),
    })
}
