//! Local cache of raw dataset files.
//!
//! A cached file is trusted for as long as it exists: nothing is refreshed or invalidated
//! automatically. Each download also leaves a small JSON manifest next to the file, used to
//! flag a cache entry whose size no longer matches what was downloaded.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub mod archive;
pub mod parquet;

/// Provenance of one downloaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub url: String,
    pub size_bytes: u64,
    pub downloaded_at: DateTime<Utc>,
}

/// Sidecar path: `<file>.manifest.json`.
pub fn manifest_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".manifest.json");
    path.with_file_name(name)
}

pub fn write_manifest(path: &Path, url: &str) -> Result<Manifest> {
    let size_bytes = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let manifest = Manifest {
        url: url.to_string(),
        size_bytes,
        downloaded_at: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let mpath = manifest_path(path);
    fs::write(&mpath, json).with_context(|| format!("writing {}", mpath.display()))?;
    Ok(manifest)
}

pub fn read_manifest(path: &Path) -> Result<Option<Manifest>> {
    let mpath = manifest_path(path);
    if !mpath.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&mpath).with_context(|| format!("reading {}", mpath.display()))?;
    let manifest = serde_json::from_str(&text)
        .with_context(|| format!("parsing manifest {}", mpath.display()))?;
    Ok(Some(manifest))
}

/// `true` when `path` exists. A size mismatch against the manifest is logged but the file
/// is still used.
pub fn is_cached(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match (read_manifest(path), fs::metadata(path)) {
        (Ok(Some(m)), Ok(meta)) if m.size_bytes != meta.len() => {
            warn!(
                path = %path.display(),
                expected = m.size_bytes,
                actual = meta.len(),
                "cached file size differs from its download manifest; using it anyway"
            );
        }
        (Err(e), _) => debug!(path = %path.display(), error = %e, "unreadable manifest"),
        _ => {}
    }
    true
}

/// Remove a cached file and its manifest, ignoring files that are already gone.
pub fn remove(path: &Path) -> Result<()> {
    for p in [path.to_path_buf(), manifest_path(path)] {
        match fs::remove_file(&p) {
            Ok(()) => debug!(path = %p.display(), "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("removing {}", p.display())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trip_and_mismatch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("GO_flux.tab");
        assert!(!is_cached(&file));

        fs::write(&file, b"0123456789")?;
        let m = write_manifest(&file, "http://example.org/x")?;
        assert_eq!(m.size_bytes, 10);
        assert_eq!(read_manifest(&file)?, Some(m));
        assert_eq!(
            manifest_path(&file).file_name().unwrap(),
            "GO_flux.tab.manifest.json"
        );

        // truncated file is still trusted
        fs::write(&file, b"01234")?;
        assert!(is_cached(&file));

        remove(&file)?;
        assert!(!file.exists());
        assert!(!manifest_path(&file).exists());
        remove(&file)?;
        Ok(())
    }
}
