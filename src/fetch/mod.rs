// src/fetch/mod.rs
//! Remote retrieval of raw dataset files into the local cache.

use anyhow::Result;
use std::{collections::BTreeMap, path::Path, time::Duration};
use tracing::{debug, instrument};

use crate::cache;
use crate::descriptor::{Descriptor, Source};

pub mod ftp;
pub mod http;
pub mod listing;

/// Size of the chunks streamed from the server to disk.
pub const CHUNK_SIZE: usize = 1024;

/// What [`ensure_local`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// The file was already cached; nothing was requested.
    Cached,
    Downloaded,
    /// The server did not answer in time; the dataset is unavailable for this call.
    TimedOut,
}

impl Fetched {
    pub fn is_available(self) -> bool {
        !matches!(self, Fetched::TimedOut)
    }
}

/// A fully resolved remote file.
#[derive(Debug, Clone, PartialEq)]
pub enum Remote {
    Http {
        url: String,
        query: BTreeMap<String, String>,
    },
    Ftp {
        dir_url: String,
        filename: String,
    },
}

impl Remote {
    /// Resolve the descriptor's source for `filename`.
    pub fn for_file(desc: &Descriptor, filename: &str) -> Remote {
        match &desc.source {
            Source::Http { url, query } => Remote::Http {
                url: url.replace("{filename}", filename),
                query: query.clone(),
            },
            Source::Ftp { url } => Remote::Ftp {
                dir_url: url.clone(),
                filename: filename.to_string(),
            },
            Source::Listing { url, .. } => Remote::Http {
                url: format!("{}/{}", url.trim_end_matches('/'), filename),
                query: BTreeMap::new(),
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Remote::Http { url, .. } => url.clone(),
            Remote::Ftp { dir_url, filename } => {
                format!("{}/{}", dir_url.trim_end_matches('/'), filename)
            }
        }
    }
}

/// Make sure `local` exists, downloading it from `remote` when it does not.
///
/// Timeouts are reported as [`Fetched::TimedOut`]; server rejections and I/O failures are
/// errors.
#[instrument(level = "info", skip_all, fields(remote = %remote.describe(), local = %local.display()))]
pub fn ensure_local(remote: &Remote, local: &Path, timeout: Duration) -> Result<Fetched> {
    if cache::is_cached(local) {
        debug!("cache hit");
        return Ok(Fetched::Cached);
    }
    if let Some(parent) = local.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let fetched = match remote {
        Remote::Http { url, query } => http::download(url, query, local, timeout)?,
        Remote::Ftp { dir_url, filename } => ftp::download(dir_url, filename, local, timeout)?,
    };
    if fetched == Fetched::Downloaded {
        cache::write_manifest(local, &remote.describe())?;
    }
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::builtin;

    #[test]
    fn resolves_url_templates() -> Result<()> {
        let r = Remote::for_file(&builtin("mattei")?, "x.txt");
        assert_eq!(
            r,
            Remote::Http {
                url: "https://download.pangaea.de/dataset/932417/files/x.txt".into(),
                query: BTreeMap::new()
            }
        );
        let r = Remote::for_file(&builtin("mouw")?, "GO_flux.tab");
        match r {
            Remote::Http { url, query } => {
                assert_eq!(url, "https://doi.pangaea.de/10.1594/PANGAEA.855594");
                assert_eq!(query.get("format").map(String::as_str), Some("textfile"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let r = Remote::for_file(&builtin("gdp")?, "buoydata_1_5000.dat.gz");
        assert_eq!(
            r.describe(),
            "ftp://ftp.aoml.noaa.gov/phod/pub/buoydata/buoydata_1_5000.dat.gz"
        );
        Ok(())
    }

    #[test]
    fn cached_file_is_not_fetched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("present.tab");
        std::fs::write(&local, b"x")?;
        // unroutable address: any request would fail
        let remote = Remote::Http {
            url: "http://127.0.0.1:9/never".into(),
            query: BTreeMap::new(),
        };
        assert_eq!(ensure_local(&remote, &local, Duration::from_secs(1))?, Fetched::Cached);
        Ok(())
    }
}
