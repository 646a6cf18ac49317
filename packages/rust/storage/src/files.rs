//! JSON file helpers: whole-document reads and atomic replace-on-write.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use lawwatch_shared::{LawWatchError, Result};

/// Read and decode a JSON document. A missing file yields `Ok(None)`.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LawWatchError::Persistence(format!(
                "{}: read failed: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        LawWatchError::Persistence(format!("{}: invalid JSON: {e}", path.display()))
    })
}

/// Encode `value` as pretty JSON and replace `path` with it.
///
/// Writes and syncs a sibling temp file first, then renames over the target,
/// so readers (and a restart after a crash) see either the old document or
/// the new one.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            LawWatchError::Persistence(format!("{}: mkdir failed: {e}", parent.display()))
        })?;
    }

    let mut body = serde_json::to_vec_pretty(value).map_err(|e| {
        LawWatchError::Persistence(format!("{}: encode failed: {e}", path.display()))
    })?;
    body.push(b'\n');

    let tmp = temp_path(path);
    let write_failed =
        |e: std::io::Error| LawWatchError::Persistence(format!("{}: write failed: {e}", tmp.display()));

    let mut file = tokio::fs::File::create(&tmp).await.map_err(write_failed)?;
    file.write_all(&body).await.map_err(write_failed)?;
    // The rename must not become visible before the data is on disk.
    file.sync_all().await.map_err(write_failed)?;
    drop(file);

    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        LawWatchError::Persistence(format!("{}: replace failed: {e}", path.display()))
    })?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
