// src/datasets/mouw.rs
//! Global ocean particulate organic carbon flux (Mouw et al. 2016, PANGAEA 855594).

use anyhow::Result;
use std::path::Path;

use super::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::table::Table;

/// Uncertainty and bookkeeping columns, dropped unless `with_std` is requested.
pub const STD_COLUMNS: &[&str] = &[
    "Flux std dev [±]",
    "C flux [mg/m**2/day]",
    "C flux std dev [±]",
    "POC flux std dev [±]",
    "PIC flux std dev [±]",
    "PON flux std dev [±]",
    "POP flux std dev [±]",
    "PSi flux std dev [±]",
    "PAl std dev [±]",
    "CaCO3 flux std dev [±]",
    "Reference",
];

pub fn descriptor() -> Result<Descriptor> {
    builtin("mouw")
}

pub fn load(cache_dir: &Path, filename: Option<&str>, with_std: bool) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir, with_std)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path, with_std: bool) -> Result<Option<Table>> {
    let mut desc = desc.clone();
    if !with_std {
        desc.drop.extend(STD_COLUMNS.iter().map(|c| c.to_string()));
    }
    loader::load(&desc, cache_dir)
}

pub fn download(cache_dir: &Path, filename: Option<&str>) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, filename), cache_dir)
}
