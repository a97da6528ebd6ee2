// src/datasets/valente/chl.rs
//! In situ chlorophyll-a, with the HPLC and fluorometric measurements as `chl_hplc` and `chl_fluo`.

use anyhow::Result;
use std::path::Path;

use crate::datasets::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::table::Table;

pub fn descriptor() -> Result<Descriptor> {
    builtin("valente_chl")
}

/// `filename` is a path inside the archive, e.g. `datasets/insitudb_chla.tab`.
pub fn load(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    loader::load(desc, cache_dir)
}

pub fn download(cache_dir: &Path, filename: Option<&str>) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, filename), cache_dir)
}
