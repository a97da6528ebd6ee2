use thiserror::Error;

/// Fatal fetch failures. Timeouts are not errors; they surface as
/// [`Fetched::TimedOut`](crate::fetch::Fetched::TimedOut).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not download {url} from server, status {status}")]
    Status { url: String, status: u16 },

    #[error("'{filename}' is not on the ftp server {host}")]
    MissingRemote { host: String, filename: String },

    #[error("ftp transfer of '{filename}' rejected: {reason}")]
    Transfer { filename: String, reason: String },

    #[error("unsupported remote locator {0}")]
    Locator(String),
}
