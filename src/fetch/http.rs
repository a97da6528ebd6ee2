// src/fetch/http.rs
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Fetched, CHUNK_SIZE};
use crate::cache;
use crate::error::FetchError;

fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// `Ok(None)` when the server did not answer within `timeout`.
fn send(url: &str, query: &BTreeMap<String, String>, timeout: Duration) -> Result<Option<Response>> {
    let resp = match client(timeout)?.get(url).query(query).send() {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => {
            warn!(url, "Connection to server timed out.");
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("GET {url}")),
    };
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    Ok(Some(resp))
}

fn is_timeout(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::TimedOut {
        return true;
    }
    e.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(reqwest::Error::is_timeout)
}

/// Stream `url` into `local`, writing and flushing one chunk at a time.
///
/// A timeout, whether before the response or while reading the body, removes any partial
/// file and yields [`Fetched::TimedOut`].
pub fn download(
    url: &str,
    query: &BTreeMap<String, String>,
    local: &Path,
    timeout: Duration,
) -> Result<Fetched> {
    let Some(mut resp) = send(url, query, timeout)? else {
        return Ok(Fetched::TimedOut);
    };

    let mut file = File::create(local).with_context(|| format!("creating {}", local.display()))?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match resp.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                drop(file);
                if let Err(err) = cache::remove(local) {
                    warn!(path = %local.display(), error = %err, "could not remove partial download");
                }
                if is_timeout(&e) {
                    warn!(url, written, "Connection to server timed out.");
                    return Ok(Fetched::TimedOut);
                }
                return Err(e).with_context(|| format!("reading body of {url}"));
            }
        };
        file.write_all(&buf[..n])?;
        file.flush()?;
        written += n as u64;
    }
    debug!(url, written, "body complete");
    info!(path = %local.display(), bytes = written, "downloaded");
    Ok(Fetched::Downloaded)
}

/// Fetch a small text resource such as a directory listing.
pub fn get_text(url: &str, timeout: Duration) -> Result<Option<String>> {
    let Some(resp) = send(url, &BTreeMap::new(), timeout)? else {
        return Ok(None);
    };
    let body = resp
        .text()
        .with_context(|| format!("reading body from {url}"))?;
    Ok(Some(body))
}
