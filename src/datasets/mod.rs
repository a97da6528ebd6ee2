// src/datasets/mod.rs
//! Per-dataset entry points.
//!
//! Every module exposes `descriptor()`, `load(cache_dir, filename)` and
//! `download(cache_dir, filename)`, plus a `load_with` variant taking an explicit
//! [`Descriptor`] so a dataset can be pointed at a mirror.

use anyhow::{bail, Result};
use std::path::Path;

use crate::descriptor::Descriptor;
use crate::table::Table;

pub mod buitenhuis;
pub mod gdp;
pub mod hot;
pub mod mapps;
pub mod mattei;
pub mod mouw;
pub mod oscillations;
pub mod valente;

pub(crate) use crate::descriptor::builtin;

/// Apply an optional filename override.
pub(crate) fn resolve(desc: &Descriptor, filename: Option<&str>) -> Descriptor {
    match filename {
        Some(f) => desc.clone().with_filename(f),
        None => desc.clone(),
    }
}

/// Load any dataset by registry name with default options.
pub fn load_by_name(name: &str, cache_dir: &Path) -> Result<Option<Table>> {
    match name {
        "mouw" => mouw::load(cache_dir, None, false),
        "mattei" => mattei::load(cache_dir, None),
        "buitenhuis" => buitenhuis::load(cache_dir, None),
        "hot" => hot::load(cache_dir, None),
        "gdp" => gdp::load_all(cache_dir, gdp::Groups::default()),
        "valente_chl" => valente::chl::load(cache_dir, None),
        "valente_rrs" => valente::rrs::load(cache_dir, None),
        "mapps" => mapps::load(cache_dir, None),
        "mapps_pml" => mapps::pml::load(cache_dir, None),
        "enso" => oscillations::enso(cache_dir, None),
        "iod" => oscillations::iod(cache_dir, None),
        other => bail!("unknown dataset {other}"),
    }
}

/// Fetch the raw files of any dataset by registry name; `false` when the server timed out.
pub fn download_by_name(name: &str, cache_dir: &Path) -> Result<bool> {
    match name {
        "mouw" => mouw::download(cache_dir, None),
        "mattei" => mattei::download(cache_dir, None),
        "buitenhuis" => buitenhuis::download(cache_dir, None),
        "hot" => hot::download(cache_dir),
        "gdp" => gdp::download_all(cache_dir),
        "valente_chl" => valente::chl::download(cache_dir, None),
        "valente_rrs" => valente::rrs::download(cache_dir, None),
        "mapps" => mapps::download(cache_dir, None),
        "mapps_pml" => mapps::pml::download(cache_dir, None),
        "enso" | "iod" => oscillations::download(name, cache_dir),
        other => bail!("unknown dataset {other}"),
    }
}
