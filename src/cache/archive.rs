use anyhow::{Context, Result};
use std::{fs::File, path::Path};
use tracing::{info, instrument};
use zip::ZipArchive;

/// Extract every entry of `zip_path` into `dest_dir`.
#[instrument(level = "info", skip_all, fields(path = %zip_path.display()))]
pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;
    let entries = archive.len();
    archive
        .extract(dest_dir)
        .with_context(|| format!("Failed to extract {:?} into {:?}", zip_path, dest_dir))?;
    info!(entries, dest = %dest_dir.display(), "extracted");
    Ok(entries)
}
