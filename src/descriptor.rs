//! Data-driven dataset descriptors.
//!
//! A descriptor holds everything the generic fetch/normalize pipeline needs to know about
//! one dataset: where it lives, how its raw file is laid out, how verbose source labels map
//! onto the shared vocabulary, and which way longitudes wrap. The built-in descriptors are
//! YAML files embedded at compile time.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

static BUILTIN: &[(&str, &str)] = &[
    ("mouw", include_str!("../descriptors/mouw.yaml")),
    ("mattei", include_str!("../descriptors/mattei.yaml")),
    ("buitenhuis", include_str!("../descriptors/buitenhuis.yaml")),
    ("hot", include_str!("../descriptors/hot.yaml")),
    ("gdp", include_str!("../descriptors/gdp.yaml")),
    ("valente_chl", include_str!("../descriptors/valente_chl.yaml")),
    ("valente_rrs", include_str!("../descriptors/valente_rrs.yaml")),
    ("mapps", include_str!("../descriptors/mapps.yaml")),
    ("mapps_pml", include_str!("../descriptors/mapps_pml.yaml")),
    ("enso", include_str!("../descriptors/enso.yaml")),
    ("iod", include_str!("../descriptors/iod.yaml")),
];

/// Names of all built-in descriptors, in registry order.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Parse the embedded descriptor called `name`.
pub fn builtin(name: &str) -> Result<Descriptor> {
    let (_, yaml) = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .with_context(|| format!("no built-in descriptor named {name}"))?;
    Descriptor::from_yaml(yaml).with_context(|| format!("parsing built-in descriptor {name}"))
}

/// Where a raw file is fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// `url` may contain a `{filename}` placeholder.
    Http {
        url: String,
        #[serde(default)]
        query: BTreeMap<String, String>,
    },
    /// An anonymous FTP directory; the descriptor filename is fetched from it.
    Ftp { url: String },
    /// An HTML index page listing many raw files with a common extension.
    Listing { url: String, extension: String },
}

/// Container the raw file is shipped in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Archive {
    /// The download is a zip, extracted into the cache directory; `filename` names a member.
    Zip { name: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// Layout of the raw file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Format {
    /// Free-text preamble ending on the line containing `sentinel`, then a delimited table.
    SentinelDelimited {
        sentinel: String,
        #[serde(default = "default_tab")]
        delimiter: char,
    },
    /// Only lines with more than `min_fields` parts count; each keeps its last `count` parts.
    TrailingFields {
        count: usize,
        min_fields: usize,
        #[serde(default = "default_tab")]
        delimiter: char,
    },
    Excel,
    /// Positional whitespace-separated columns.
    Whitespace {
        #[serde(default)]
        skip_rows: usize,
        names: Vec<String>,
    },
    Csv,
    /// One line per year with twelve monthly values.
    MonthlyMatrix,
}

/// How the `time` index is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexSpec {
    /// A date/time column, referenced by its name after renaming.
    Column {
        name: String,
        #[serde(default)]
        dayfirst: bool,
        /// Explicit `chrono` format, tried before the built-in ones.
        #[serde(default)]
        format: Option<String>,
    },
    /// The column at `position` (before renaming).
    Position {
        position: usize,
        #[serde(default)]
        dayfirst: bool,
    },
    /// Composite date from separate fields; the fields are removed afterwards.
    Parts {
        year: String,
        month: String,
        #[serde(default)]
        day: Option<String>,
        #[serde(default)]
        hour: Option<String>,
    },
}

/// Direction in which out-of-range longitudes are folded back into [-180, 180].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LonWrap {
    #[default]
    None,
    /// `lon > 180` becomes `lon - 360`.
    SubtractAbove180,
    /// `lon < -180` becomes `lon + 360`.
    AddBelowMinus180,
}

impl LonWrap {
    pub fn apply(self, lon: f64) -> f64 {
        match self {
            LonWrap::SubtractAbove180 if lon > 180.0 => lon - 360.0,
            LonWrap::AddBelowMinus180 if lon < -180.0 => lon + 360.0,
            _ => lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub source: Source,
    pub filename: String,
    /// Cache subdirectory below the cache root.
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub archive: Option<Archive>,
    #[serde(default)]
    pub compression: Compression,
    pub format: Format,
    #[serde(default)]
    pub na_values: Vec<String>,
    /// When set, every other column is discarded before any other step.
    #[serde(default)]
    pub keep: Option<Vec<String>>,
    #[serde(default)]
    pub drop: Vec<String>,
    #[serde(default)]
    pub drop_patterns: Vec<String>,
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    pub index: IndexSpec,
    #[serde(default)]
    pub timestamp_columns: Vec<String>,
    #[serde(default)]
    pub text_columns: Vec<String>,
    #[serde(default)]
    pub constants: BTreeMap<String, f64>,
    #[serde(default)]
    pub lon_wrap: LonWrap,
    #[serde(default = "default_true")]
    pub spatial: bool,
}

fn default_tab() -> char {
    '\t'
}

fn default_timeout_secs() -> u64 {
    6
}

fn default_true() -> bool {
    true
}

impl Descriptor {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let desc: Descriptor = serde_yaml::from_str(yaml)?;
        desc.validate()?;
        Ok(desc)
    }

    fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            bail!("descriptor {} has an empty filename", self.name);
        }
        if let Format::Whitespace { names, .. } = &self.format {
            if names.is_empty() {
                bail!("descriptor {} declares no whitespace column names", self.name);
            }
        }
        if self.spatial && self.lon_wrap != LonWrap::None && !self.produces("lon") {
            bail!("descriptor {} wraps longitudes but never produces `lon`", self.name);
        }
        Ok(())
    }

    /// Best-effort check that `column` can appear in the output. Only formats with declared
    /// names are checked; header-driven formats are trusted.
    fn produces(&self, column: &str) -> bool {
        if self.rename.values().any(|v| v == column) || self.constants.contains_key(column) {
            return true;
        }
        match &self.format {
            Format::Whitespace { names, .. } => names.iter().any(|n| n == column),
            _ => true,
        }
    }

    /// Same descriptor pointed at a different default file.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory holding this dataset's files below `cache_root`.
    pub fn cache_dir(&self, cache_root: &Path) -> PathBuf {
        match &self.subdir {
            Some(sub) => cache_root.join(sub),
            None => cache_root.to_path_buf(),
        }
    }

    /// Path of the raw file the normalizer reads.
    pub fn raw_path(&self, cache_root: &Path) -> PathBuf {
        self.cache_dir(cache_root).join(&self.filename)
    }

    /// Path of the file the fetcher writes: the archive when there is one, else the raw file.
    pub fn download_path(&self, cache_root: &Path) -> PathBuf {
        match &self.archive {
            Some(Archive::Zip { name }) => self.cache_dir(cache_root).join(name),
            None => self.raw_path(cache_root),
        }
    }

    /// Name of the remote file to request.
    pub fn remote_filename(&self) -> &str {
        match &self.archive {
            Some(Archive::Zip { name }) => name,
            None => &self.filename,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_parse() -> Result<()> {
        for name in builtin_names() {
            let desc = builtin(name)?;
            assert_eq!(desc.name, name);
        }
        Ok(())
    }

    #[test]
    fn wrap_directions_are_dataset_specific() -> Result<()> {
        assert_eq!(builtin("mouw")?.lon_wrap, LonWrap::SubtractAbove180);
        assert_eq!(builtin("gdp")?.lon_wrap, LonWrap::SubtractAbove180);
        assert_eq!(builtin("mattei")?.lon_wrap, LonWrap::AddBelowMinus180);
        Ok(())
    }

    #[test]
    fn lon_wrap_apply() {
        assert_eq!(LonWrap::SubtractAbove180.apply(190.0), -170.0);
        assert_eq!(LonWrap::SubtractAbove180.apply(-190.0), -190.0);
        assert_eq!(LonWrap::AddBelowMinus180.apply(-190.0), 170.0);
        assert_eq!(LonWrap::AddBelowMinus180.apply(190.0), 190.0);
        assert_eq!(LonWrap::None.apply(400.0), 400.0);
    }

    #[test]
    fn archive_paths() -> Result<()> {
        let desc = builtin("valente_chl")?;
        let root = Path::new("/cache");
        assert_eq!(
            desc.download_path(root),
            PathBuf::from("/cache/valente_iop/valente_2019.zip")
        );
        assert_eq!(
            desc.raw_path(root),
            PathBuf::from("/cache/valente_iop/datasets/insitudb_chla.tab")
        );
        assert_eq!(desc.remote_filename(), "valente_2019.zip");
        Ok(())
    }

    #[test]
    fn rejects_wrap_without_lon() {
        let yaml = r#"
name: broken
source: {kind: ftp, url: "ftp://example.org/pub/"}
filename: x.dat
format: {kind: whitespace, names: [year, month, lat]}
index: {kind: parts, year: year, month: month}
lon_wrap: subtract_above180
"#;
        assert!(Descriptor::from_yaml(yaml).is_err());
    }
}
