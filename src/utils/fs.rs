//! Atomic artifact writes
//!
//! Artifacts are written to a temporary file in the destination directory and
//! renamed over the target, so readers see either the old file or the new
//! one and never a partial write.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Write `bytes` to `path` atomically
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |writer| {
        writer.write_all(bytes)?;
        Ok(())
    })
}

/// Stream content into a temporary sibling of `path`, then rename it into place
pub fn write_atomic_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    stage_with(path, fill)?.commit()
}

/// A fully written temporary file waiting to replace its target
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over its target
    pub fn commit(self) -> Result<()> {
        self.tmp.persist(&self.target)?;
        tracing::debug!(path = %self.target.display(), "Artifact written");
        Ok(())
    }
}

/// Write content to a temporary sibling of `path` without touching `path`
pub fn stage_with<F>(path: &Path, fill: F) -> Result<StagedFile>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    Ok(StagedFile {
        tmp,
        target: path.to_path_buf(),
    })
}

/// Stage `value` as pretty JSON next to `path`
pub fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<StagedFile> {
    let json = serde_json::to_vec_pretty(value)?;
    stage_with(path, |writer| {
        writer.write_all(&json)?;
        Ok(())
    })
}

/// Commit staged files in order; if one fails, targets already replaced are
/// restored to their previous content (or removed if they did not exist).
pub fn commit_all(staged: Vec<StagedFile>) -> Result<()> {
    let mut previous: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
    for file in &staged {
        let old = match fs::read(file.target()) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        previous.push((file.target().to_path_buf(), old));
    }

    for (done, file) in staged.into_iter().enumerate() {
        if let Err(e) = file.commit() {
            for (path, old) in previous.iter().take(done) {
                let restored = match old {
                    Some(bytes) => write_atomic(path, bytes),
                    None => fs::remove_file(path).map_err(Into::into),
                };
                if let Err(restore_err) = restored {
                    tracing::error!(
                        path = %path.display(),
                        error = %restore_err,
                        "Failed to restore artifact"
                    );
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// Read and deserialize a JSON artifact
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
