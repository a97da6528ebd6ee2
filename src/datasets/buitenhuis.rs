// src/datasets/buitenhuis.rs
//! Primary production compilation of Buitenhuis et al. (2013), from the UEA GreenOcean archive.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use super::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::process::{utils::coerce_int, utils::parse_f64, RawTable};
use crate::table::Table;

pub fn descriptor() -> Result<Descriptor> {
    builtin("buitenhuis")
}

pub fn load(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    loader::load_with(desc, cache_dir, clean)
}

pub fn download(cache_dir: &Path, filename: Option<&str>) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, filename), cache_dir)
}

/// Some years carry a marker prefix (`*1998`); those are stripped to the integer. Rows whose
/// `PP` is text or not positive are discarded.
pub fn clean(raw: &mut RawTable) -> Result<()> {
    let years = raw
        .column("Year")
        .context("Year column missing")?
        .enumerate()
        .map(|(i, y)| match y.trim() {
            "" => Ok(String::new()),
            y => coerce_int(y)
                .map(|v| v.to_string())
                .with_context(|| format!("row {}: year {y:?}", i + 1)),
        })
        .collect::<Result<Vec<_>>>()?;
    raw.set_column("Year", years)?;

    let pp = raw.position("PP").context("PP column missing")?;
    let before = raw.len();
    raw.retain_rows(|row| parse_f64(&row[pp]).is_some_and(|v| v > 0.0));
    debug!(dropped = before - raw.len(), "rows without positive PP");
    Ok(())
}
