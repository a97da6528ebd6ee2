// src/datasets/hot.rs
//! Hawaii Ocean Time-series primary production at Station ALOHA.
//!
//! The archive is a directory of per-cruise `.pp` files. All of them are downloaded, parsed,
//! concatenated and normalized once; the combined table is then kept as a Parquet file and
//! reused on later loads.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::{builtin, resolve};
use crate::cache::{self, parquet};
use crate::descriptor::{Descriptor, Source};
use crate::fetch::{self, listing, Fetched, Remote};
use crate::process::{normalize, normalize::blank_na_values, read_raw, utils::parse_f64, RawTable};
use crate::table::Table;

const LIGHT: [&str; 3] = ["light1", "light2", "light3"];
const DARK: [&str; 3] = ["dark1", "dark2", "dark3"];

pub fn descriptor() -> Result<Descriptor> {
    builtin("hot")
}

/// Load the combined table. `filename` overrides the name of the Parquet file.
pub fn load(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir)
}

#[instrument(level = "info", skip(desc), fields(cache = %cache_dir.display()))]
pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    let combined = desc.raw_path(cache_dir);
    if cache::is_cached(&combined) {
        return parquet::read_table(&combined).map(Some);
    }
    if !download_with(desc, cache_dir)? {
        return Ok(None);
    }
    let table = build(desc, &cached_files(desc, cache_dir)?)?;
    parquet::write_table(&combined, &table)?;
    info!(rows = table.num_rows(), path = %combined.display(), "wrote combined table");
    Ok(Some(table))
}

pub fn download(cache_dir: &Path) -> Result<bool> {
    download_with(&descriptor()?, cache_dir)
}

/// Fetch every file in the remote listing, one after the other. `false` as soon as the
/// listing or any file times out.
pub fn download_with(desc: &Descriptor, cache_dir: &Path) -> Result<bool> {
    let Source::Listing { url, extension } = &desc.source else {
        anyhow::bail!("{} is not a listing source", desc.name);
    };
    let Some(names) = listing::linked_files(url, extension, desc.timeout())? else {
        return Ok(false);
    };
    if names.is_empty() {
        warn!(url, "listing has no .{extension} files");
    }
    let dir = desc.cache_dir(cache_dir);
    for name in &names {
        let remote = Remote::for_file(desc, name);
        if fetch::ensure_local(&remote, &dir.join(name), desc.timeout())? == Fetched::TimedOut {
            return Ok(false);
        }
    }
    info!(files = names.len(), "listing fetched");
    Ok(true)
}

/// Raw files already in the cache, in name order.
pub fn cached_files(desc: &Descriptor, cache_dir: &Path) -> Result<Vec<PathBuf>> {
    let extension = match &desc.source {
        Source::Listing { extension, .. } => extension.as_str(),
        _ => "pp",
    };
    let pattern = desc.cache_dir(cache_dir).join(format!("*.{extension}"));
    let pattern = pattern.to_string_lossy();
    let mut files = glob::glob(&pattern)
        .with_context(|| format!("bad glob {pattern}"))?
        .collect::<Result<Vec<_>, _>>()?;
    files.sort();
    Ok(files)
}

/// One cruise file with the replicate incubations reduced to `pp_light`, `pp_dark` and
/// `pp_obs`.
pub fn read_pp(desc: &Descriptor, path: &Path) -> Result<RawTable> {
    let mut raw = read_raw(desc, path)?;
    blank_na_values(&mut raw, &desc.na_values);

    let light = nan_mean(&raw, &LIGHT)?;
    let dark = nan_mean(&raw, &DARK)?;
    let obs = light
        .iter()
        .zip(&dark)
        .map(|(l, d)| match (l, d) {
            (Some(l), Some(d)) => Some((l - d).max(0.0)),
            _ => None,
        })
        .collect::<Vec<_>>();

    raw.add_column("pp_light", to_cells(&light))?;
    raw.add_column("pp_dark", to_cells(&dark))?;
    raw.add_column("pp_obs", to_cells(&obs))?;
    Ok(raw)
}

/// Concatenate and normalize the given cruise files.
pub fn build(desc: &Descriptor, files: &[PathBuf]) -> Result<Table> {
    let mut all = RawTable::default();
    for path in files {
        let raw = read_pp(desc, path).with_context(|| format!("reading {}", path.display()))?;
        all.extend(raw)?;
    }
    if all.headers.is_empty() {
        anyhow::bail!("no .pp files to combine");
    }
    normalize(desc, all)
}

/// Row-wise mean of the present values; `None` where all are missing.
fn nan_mean(raw: &RawTable, columns: &[&str]) -> Result<Vec<Option<f64>>> {
    let idx = columns
        .iter()
        .map(|c| raw.position(c).with_context(|| format!("{c} column missing")))
        .collect::<Result<Vec<_>>>()?;
    Ok(raw
        .rows
        .iter()
        .map(|row| {
            let vals: Vec<f64> = idx.iter().filter_map(|&i| parse_f64(&row[i])).collect();
            (!vals.is_empty()).then(|| vals.iter().sum::<f64>() / vals.len() as f64)
        })
        .collect())
}

fn to_cells(values: &[Option<f64>]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::INDEX;
    use crate::testutil::StubServer;
    use arrow::array::Array;

    const PREAMBLE: &str = "HOT primary production\n\n\n\n\n\n\n";

    fn pp_file(rows: &[&str]) -> Vec<u8> {
        format!("{PREAMBLE}{}\n", rows.join("\n")).into_bytes()
    }

    fn served() -> Result<(StubServer, Descriptor)> {
        let index = r#"<html><a href="hot1.pp">hot1.pp</a> <a href="hot2.pp">hot2.pp</a> <a href="notes.txt">x</a></html>"#;
        let server = StubServer::start(vec![
            ("/pp/", index.as_bytes().to_vec()),
            (
                "/pp/hot1.pp",
                pp_file(&[
                    "HOT-1 1 0600 881201 0630 1830 5 0.08 0.01 0.05 0.01 6.0 6.5 -9 0.25 0.25 0.25 35.1 -9 -9 -9 -9 000000",
                    "HOT-1 1 0600 881201 0630 1830 25 0.09 0.01 0.05 0.01 0.1 0.1 0.1 0.5 0.5 0.5 35.2 -9 -9 -9 -9 000000",
                ]),
            ),
            (
                "/pp/hot2.pp",
                pp_file(&[
                    "HOT-2 1 0600 890115 0630 1830 5 0.07 0.01 0.04 0.01 -9 -9 -9 -9 -9 -9 35.0 -9 -9 -9 -9 100000",
                ]),
            ),
        ]);
        let mut desc = descriptor()?;
        desc.source = Source::Listing {
            url: server.url("/pp/"),
            extension: "pp".into(),
        };
        Ok((server, desc))
    }

    #[test]
    fn replicates_are_averaged_and_clamped() -> Result<()> {
        let (_server, desc) = served()?;
        let dir = tempfile::tempdir()?;
        let table = load_with(&desc, dir.path())?.expect("served");

        assert_eq!(table.num_rows(), 3);
        for gone in LIGHT.iter().chain(DARK.iter()).chain(["date"].iter()) {
            assert!(!table.has_column(gone));
        }
        let names = table.column_names();
        assert_eq!(names.iter().filter(|n| n.as_str() == INDEX).count(), 1);
        assert_eq!(table.f64_column("sample_time").unwrap().value(0), 600.0);
        let light = table.f64_column("pp_light").unwrap();
        let obs = table.f64_column("pp_obs").unwrap();
        assert_eq!(light.value(0), 6.25);
        assert_eq!(obs.value(0), 6.0);
        assert_eq!(obs.value(1), 0.0);
        assert!(obs.is_null(2));

        let lat = table.f64_column("lat").unwrap();
        let lon = table.f64_column("lon").unwrap();
        assert!(lat.iter().all(|v| v == Some(22.75)));
        assert!(lon.iter().all(|v| v == Some(-158.0)));
        assert_eq!(
            table.times()[2],
            chrono::NaiveDate::from_ymd_opt(1989, 1, 15).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        Ok(())
    }

    #[test]
    fn combined_table_is_reused() -> Result<()> {
        let (server, desc) = served()?;
        let dir = tempfile::tempdir()?;
        let first = load_with(&desc, dir.path())?.expect("served");
        assert_eq!(server.hits(), 3);
        assert!(dir.path().join("HOT/pp/pp_hot.parquet").is_file());
        assert_eq!(cached_files(&desc, dir.path())?.len(), 2);

        let second = load_with(&desc, dir.path())?.expect("cached");
        assert_eq!(server.hits(), 3);
        assert_eq!(first, second);
        Ok(())
    }
}
