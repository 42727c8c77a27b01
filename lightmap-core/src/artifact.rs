// On-disk artifacts passed between pipeline stages

use crate::model::{LighthouseDataset, RawNameList};
use lightmap_scanner::ListingEntry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Mode for a brand new artifact; the process umask still applies.
#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Write `contents` to `path` through a temp file in the same directory, so
/// readers see either the old file or the complete new one. An existing
/// file keeps its permissions.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let previous = fs::metadata(path).ok().map(|meta| meta.permissions());
    let mut builder = Builder::new();
    if previous.is_none()
        && let Some(permissions) = new_file_permissions()
    {
        builder.permissions(permissions);
    }
    let mut tmp = builder.tempfile_in(dir).map_err(io_error(dir))?;
    if let Some(permissions) = previous {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(io_error(path))?;
    }
    tmp.write_all(contents).map_err(io_error(path))?;
    tmp.as_file().sync_all().map_err(io_error(path))?;
    tmp.persist(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_raw_names(path: &Path, names: &RawNameList) -> Result<()> {
    write_json(path, names)
}

/// Accepted raw name inputs, besides the scraper's own document.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawInput {
    List(RawNameList),
    Entries(Vec<ListingEntry>),
    Names(Vec<String>),
}

/// Load a raw name list. JSON files may hold the scraper's document, a bare
/// array of entries, or an array of names; anything else is read as plain
/// text with one name per line (blank lines and `#` comments skipped).
pub fn load_raw_names(path: &Path) -> Result<RawNameList> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let trimmed = content.trim_start();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let input: RawInput =
            serde_json::from_str(&content).map_err(|source| ArtifactError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(match input {
            RawInput::List(list) => list,
            RawInput::Entries(entries) => RawNameList {
                source: None,
                fetched_at: None,
                entries,
            },
            RawInput::Names(names) => RawNameList::from_names(names),
        });
    }

    Ok(RawNameList::from_names(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    ))
}

pub fn save_dataset(path: &Path, dataset: &LighthouseDataset) -> Result<()> {
    write_json(path, dataset)
}

pub fn load_dataset(path: &Path) -> Result<LighthouseDataset> {
    read_json(path)
}
