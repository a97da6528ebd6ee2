// src/datasets/gdp.rs
//! NOAA Global Drifter Program six-hourly interpolated drifter data.
//!
//! The archive is split into four gzip files by drifter id range. Each is normalized once
//! and kept as Parquet next to the download; optional column groups are dropped after the
//! cache is read so a cached file serves every combination of options.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::{builtin, resolve};
use crate::cache::{self, parquet};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::process::RawTable;
use crate::table::Table;

/// First drifter id of each published file, with the file's upper label.
pub const RANGES: [(u32, &str); 4] = [(1, "5000"), (5001, "10000"), (10001, "15000"), (15001, "mar20")];

const SST: &[&str] = &["sst"];
const VELOCITY: &[&str] = &["vel_east", "vel_north", "speed"];
const VARIANCE: &[&str] = &["var_lat", "var_lon", "var_temp"];

/// Optional column groups; all off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Groups {
    pub sst: bool,
    pub vel: bool,
    pub var: bool,
}

impl Groups {
    fn excluded(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.sst {
            out.extend_from_slice(SST);
        }
        if !self.vel {
            out.extend_from_slice(VELOCITY);
        }
        if !self.var {
            out.extend_from_slice(VARIANCE);
        }
        out
    }
}

/// `buoydata_<v1>_<v2>.dat.gz` for the range starting at `v1`.
pub fn filename(v1: u32) -> Result<String> {
    match RANGES.iter().find(|(start, _)| *start == v1) {
        Some((start, end)) => Ok(format!("buoydata_{start}_{end}.dat.gz")),
        None => bail!("no drifter file starts at id {v1}"),
    }
}

pub fn descriptor() -> Result<Descriptor> {
    builtin("gdp")
}

/// Derived cache next to the raw file.
pub fn parquet_path(desc: &Descriptor, cache_dir: &Path) -> PathBuf {
    let raw = desc.raw_path(cache_dir);
    let name = desc.filename.trim_end_matches(".gz").trim_end_matches(".dat");
    raw.with_file_name(format!("{name}.parquet"))
}

/// Load the file starting at drifter id `v1`.
pub fn load(cache_dir: &Path, v1: u32, groups: Groups) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, Some(filename(v1)?.as_str())), cache_dir, groups)
}

/// All four files concatenated; `None` if any of them timed out.
pub fn load_all(cache_dir: &Path, groups: Groups) -> Result<Option<Table>> {
    let mut tables = Vec::with_capacity(RANGES.len());
    for (v1, _) in RANGES {
        match load(cache_dir, v1, groups)? {
            Some(t) => tables.push(t),
            None => return Ok(None),
        }
    }
    Table::concat(&tables).map(Some)
}

#[instrument(level = "info", skip(desc), fields(file = %desc.filename))]
pub fn load_with(desc: &Descriptor, cache_dir: &Path, groups: Groups) -> Result<Option<Table>> {
    let derived = parquet_path(desc, cache_dir);
    let full = if cache::is_cached(&derived) {
        parquet::read_table(&derived)?
    } else {
        if !loader::download(desc, cache_dir)? {
            return Ok(None);
        }
        let table = loader::parse_with(desc, &desc.raw_path(cache_dir), split_fractional_day)?;
        parquet::write_table(&derived, &table)?;
        info!(rows = table.num_rows(), path = %derived.display(), "wrote derived cache");
        table
    };
    full.without(&groups.excluded()).map(Some)
}

pub fn download(cache_dir: &Path, v1: u32) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, Some(filename(v1)?.as_str())), cache_dir)
}

pub fn download_all(cache_dir: &Path) -> Result<bool> {
    for (v1, _) in RANGES {
        if !download(cache_dir, v1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `day` holds a fractional day of month; split it into a whole `day` and an `hour`.
pub fn split_fractional_day(raw: &mut RawTable) -> Result<()> {
    let mut days = Vec::with_capacity(raw.len());
    let mut hours = Vec::with_capacity(raw.len());
    for (i, cell) in raw.column("day").context("day column missing")?.enumerate() {
        let cell = cell.trim();
        if cell.is_empty() {
            days.push(String::new());
            hours.push(String::new());
            continue;
        }
        let value: f64 = cell
            .parse()
            .with_context(|| format!("row {}: day {cell:?}", i + 1))?;
        let whole = value.trunc();
        days.push((whole as i64).to_string());
        hours.push((((value - whole) * 24.0) as i64).to_string());
    }
    raw.set_column("day", days)?;
    raw.add_column("hour", hours)
}
