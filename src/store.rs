use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::model::HeroEntity;

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Size of the file at `path` if it exists and is a regular file.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

pub fn write_aggregate(path: &Path, heroes: &[HeroEntity]) -> Result<(), PipelineError> {
    let mut json = serde_json::to_string_pretty(heroes)?;
    json.push('\n');
    write_atomic(path, json.as_bytes()).map_err(|source| PipelineError::AggregateWrite {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_aggregate(path: &Path) -> Result<Vec<HeroEntity>, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|source| PipelineError::AggregateRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
