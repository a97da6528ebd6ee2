// src/datasets/mapps/mod.rs
//! MAPPS photosynthesis-irradiance (P-E) parameters (Bouman et al. 2018, PANGAEA 874087).

use anyhow::Result;
use std::path::Path;

use super::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::table::Table;

pub mod pml;

pub fn descriptor() -> Result<Descriptor> {
    builtin("mapps")
}

pub fn load(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    loader::load(desc, cache_dir)
}

pub fn download(cache_dir: &Path, filename: Option<&str>) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, filename), cache_dir)
}
