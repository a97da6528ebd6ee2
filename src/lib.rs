//! Loaders for oceanographic and ocean-colour datasets published by PANGAEA, NOAA, HOT and
//! UEA.
//!
//! Every dataset follows the same path: check the local cache, download the raw file if it
//! is missing, then parse it into a [`Table`] with a shared column vocabulary (`lat`, `lon`,
//! `depth`, `chl`, ...) and a `time` index.
//!
//! ```no_run
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cache = Path::new("/tmp/oceandata");
//! if let Some(table) = oceandata::datasets::mattei::load(cache, None)? {
//!     println!("{} rows, columns {:?}", table.num_rows(), table.column_names());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod datasets;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod process;
pub mod table;

#[cfg(test)]
pub(crate) mod testutil;

pub use descriptor::{Descriptor, LonWrap};
pub use error::FetchError;
pub use fetch::Fetched;
pub use table::Table;
