// src/fetch/ftp.rs
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{Fetched, CHUNK_SIZE};
use crate::cache;
use crate::error::FetchError;

/// Host, port and directory of an `ftp://` URL.
fn locate(dir_url: &str) -> Result<(String, u16, String), FetchError> {
    let url = Url::parse(dir_url).map_err(|e| FetchError::Locator(format!("{dir_url}: {e}")))?;
    if url.scheme() != "ftp" {
        return Err(FetchError::Locator(format!("{dir_url}: not an ftp:// URL")));
    }
    let host = url
        .host_str()
        .ok_or_else(|| FetchError::Locator(format!("{dir_url}: no host")))?
        .to_string();
    let port = url.port().unwrap_or(21);
    let path = match url.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    Ok((host, port, path))
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}"))?
        .next()
        .with_context(|| format!("{host} resolved to no address"))
}

fn io_timed_out(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn timed_out(e: &FtpError) -> bool {
    matches!(e, FtpError::ConnectionError(err) if io_timed_out(err))
}

/// A transfer failure caused by the read deadline on either connection.
fn transfer_timed_out(e: &anyhow::Error) -> bool {
    if let Some(ftp) = e.downcast_ref::<FtpError>() {
        return timed_out(ftp);
    }
    e.downcast_ref::<io::Error>().is_some_and(io_timed_out)
}

/// Fetch `filename` from the anonymous FTP directory `dir_url` into `local`.
#[instrument(level = "info", skip(local, timeout))]
pub fn download(dir_url: &str, filename: &str, local: &Path, timeout: Duration) -> Result<Fetched> {
    let (host, port, dir) = locate(dir_url)?;
    let addr = resolve(&host, port)?;

    let mut ftp = match FtpStream::connect_timeout(addr, timeout) {
        Ok(ftp) => ftp,
        Err(e) if timed_out(&e) => {
            warn!(%host, "Connection to server timed out.");
            return Ok(Fetched::TimedOut);
        }
        Err(e) => return Err(e).with_context(|| format!("connecting to {host}")),
    };
    ftp.get_ref()
        .set_read_timeout(Some(timeout))
        .context("setting FTP read timeout")?;
    ftp.login("anonymous", "anonymous@")
        .with_context(|| format!("anonymous login to {host}"))?;
    ftp.cwd(&dir).with_context(|| format!("cwd {dir} on {host}"))?;

    let listing = ftp.nlst(None).with_context(|| format!("listing {dir} on {host}"))?;
    let present = listing
        .iter()
        .any(|entry| entry.rsplit('/').next() == Some(filename));
    if !present {
        let _ = ftp.quit();
        return Err(FetchError::MissingRemote {
            host,
            filename: filename.to_string(),
        }
        .into());
    }
    ftp.transfer_type(FileType::Binary)?;

    let outcome = retrieve(&mut ftp, filename, local, timeout);
    let _ = ftp.quit();
    match outcome {
        Ok(bytes) => {
            info!(path = %local.display(), bytes, "downloaded");
            Ok(Fetched::Downloaded)
        }
        Err(e) => {
            if let Err(err) = cache::remove(local) {
                warn!(path = %local.display(), error = %err, "could not remove partial download");
            }
            if transfer_timed_out(&e) {
                warn!(%host, filename, "Connection to server timed out.");
                return Ok(Fetched::TimedOut);
            }
            Err(FetchError::Transfer {
                filename: filename.to_string(),
                reason: format!("{e:#}"),
            }
            .into())
        }
    }
}

fn retrieve(ftp: &mut FtpStream, filename: &str, local: &Path, timeout: Duration) -> Result<u64> {
    let mut stream = ftp.retr_as_stream(filename)?;
    stream
        .get_ref()
        .set_read_timeout(Some(timeout))
        .context("setting FTP data read timeout")?;
    let mut file = File::create(local).with_context(|| format!("creating {}", local.display()))?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&buf[..n])?;
        file.flush()?;
        written += n as u64;
    }
    ftp.finalize_retr_stream(stream)?;
    debug!(written, "transfer finalized");
    Ok(written)
}
