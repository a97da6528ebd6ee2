// src/loader.rs
//! The generic fetch → cache → normalize pipeline shared by every dataset module.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{info, instrument};

use crate::cache::{self, archive};
use crate::descriptor::{Archive, Descriptor};
use crate::fetch::{self, Remote};
use crate::process::{normalize, read_raw, RawTable};
use crate::table::Table;

/// Make the descriptor's raw file available under `cache_root`.
///
/// Returns `false` when the server timed out. Archived datasets are downloaded once and
/// extracted in place; a member that is already on disk short-circuits the download.
#[instrument(level = "info", skip(desc), fields(dataset = %desc.name, cache = %cache_root.display()))]
pub fn download(desc: &Descriptor, cache_root: &Path) -> Result<bool> {
    let raw_path = desc.raw_path(cache_root);
    if desc.archive.is_some() && cache::is_cached(&raw_path) {
        return Ok(true);
    }

    let remote = Remote::for_file(desc, desc.remote_filename());
    let local = desc.download_path(cache_root);
    let fetched = fetch::ensure_local(&remote, &local, desc.timeout())?;
    if !fetched.is_available() {
        return Ok(false);
    }

    if let Some(Archive::Zip { name }) = &desc.archive {
        if !raw_path.is_file() {
            archive::extract_zip(&local, &desc.cache_dir(cache_root))?;
            if !raw_path.is_file() {
                bail!("{name} does not contain {}", desc.filename);
            }
        }
    }
    Ok(true)
}

/// Read and normalize one raw file.
pub fn parse(desc: &Descriptor, path: &Path) -> Result<Table> {
    parse_with(desc, path, |_| Ok(()))
}

/// Like [`parse`], with a dataset-specific transform applied to the raw table before
/// normalization.
pub fn parse_with<F>(desc: &Descriptor, path: &Path, transform: F) -> Result<Table>
where
    F: FnOnce(&mut RawTable) -> Result<()>,
{
    let mut raw = read_raw(desc, path)?;
    transform(&mut raw)?;
    normalize(desc, raw)
}

/// Download if needed, then parse. `Ok(None)` when the server timed out.
pub fn load(desc: &Descriptor, cache_root: &Path) -> Result<Option<Table>> {
    load_with(desc, cache_root, |_| Ok(()))
}

#[instrument(level = "info", skip(desc, transform), fields(dataset = %desc.name))]
pub fn load_with<F>(desc: &Descriptor, cache_root: &Path, transform: F) -> Result<Option<Table>>
where
    F: FnOnce(&mut RawTable) -> Result<()>,
{
    if !download(desc, cache_root)? {
        return Ok(None);
    }
    let table = parse_with(desc, &desc.raw_path(cache_root), transform)?;
    info!(rows = table.num_rows(), columns = table.column_names().len(), "loaded");
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Source;
    use crate::error::FetchError;
    use crate::testutil::{hanging_server, init_tracing, StubServer};
    use std::collections::BTreeMap;

    const TAB: &str = "/* DATA DESCRIPTION:\nCitation:\tsomeone\n*/\nDate/Time\tLatitude\tLongitude\tChl a [mg/m**3]\n2001-02-03T04:05\t10.5\t-20.25\t0.3\n2002-03-04\t-5\t190\t\n";

    fn pointed_at(url: String) -> Result<Descriptor> {
        let mut desc = Descriptor::from_yaml(
            r#"
name: fixture
source: {kind: http, url: "http://unused/{filename}"}
filename: fixture.tab
subdir: fx
format: {kind: sentinel_delimited, sentinel: "*/"}
rename: {Latitude: lat, Longitude: lon, "Chl a [mg/m**3]": chl}
index: {kind: column, name: Date/Time}
"#,
        )?;
        desc.source = Source::Http {
            url,
            query: BTreeMap::new(),
        };
        Ok(desc)
    }

    #[test]
    fn second_load_reuses_cache() -> Result<()> {
        init_tracing();
        let server = StubServer::start(vec![("/fixture.tab", TAB.as_bytes().to_vec())]);
        let desc = pointed_at(server.url("/{filename}"))?;
        let dir = tempfile::tempdir()?;

        let first = load(&desc, dir.path())?.expect("served");
        assert!(dir.path().join("fx/fixture.tab").is_file());
        assert!(cache::read_manifest(&dir.path().join("fx/fixture.tab"))?.is_some());
        let second = load(&desc, dir.path())?.expect("cached");
        assert_eq!(server.hits(), 1);
        assert_eq!(first, second);
        assert_eq!(first.column_names(), vec!["time", "lat", "lon", "chl"]);
        Ok(())
    }

    #[test]
    fn separate_caches_download_separately() -> Result<()> {
        let server = StubServer::start(vec![("/fixture.tab", TAB.as_bytes().to_vec())]);
        let desc = pointed_at(server.url("/{filename}"))?;
        let a = tempfile::tempdir()?;
        let b = tempfile::tempdir()?;
        load(&desc, a.path())?;
        load(&desc, b.path())?;
        assert_eq!(server.hits(), 2);
        Ok(())
    }

    #[test]
    fn timeout_means_no_data() -> Result<()> {
        let mut desc = pointed_at(hanging_server())?;
        desc.timeout_secs = 1;
        let dir = tempfile::tempdir()?;
        assert!(load(&desc, dir.path())?.is_none());
        assert!(!download(&desc, dir.path())?);
        Ok(())
    }

    #[test]
    fn server_error_is_fatal_and_typed() -> Result<()> {
        let server = StubServer::start(vec![]);
        let desc = pointed_at(server.url("/{filename}"))?;
        let dir = tempfile::tempdir()?;
        let err = load(&desc, dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Status { status: 404, .. })
        ));
        Ok(())
    }

    #[test]
    fn transform_runs_before_normalize() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fixture.tab");
        std::fs::write(&path, TAB)?;
        let desc = pointed_at("http://unused/".into())?;
        let table = parse_with(&desc, &path, |raw| {
            raw.retain_rows(|row| !row[3].is_empty());
            Ok(())
        })?;
        assert_eq!(table.num_rows(), 1);
        Ok(())
    }
}
