// src/datasets/oscillations.rs
//! Monthly climate-index series from NOAA PSL: ENSO (MEI v2) and the Indian Ocean Dipole.
//!
//! These are plain time series; their tables carry `time` and one value column, with no
//! `lat`/`lon`.

use anyhow::{bail, Result};
use std::path::Path;

use super::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::table::Table;

pub fn enso_descriptor() -> Result<Descriptor> {
    builtin("enso")
}

pub fn iod_descriptor() -> Result<Descriptor> {
    builtin("iod")
}

/// Multivariate ENSO Index, column `enso`.
pub fn enso(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&enso_descriptor()?, filename), cache_dir)
}

/// Dipole mode index, column `iod`.
pub fn iod(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&iod_descriptor()?, filename), cache_dir)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    loader::load(desc, cache_dir)
}

/// `index` is `enso` or `iod`.
pub fn download(index: &str, cache_dir: &Path) -> Result<bool> {
    let desc = match index {
        "enso" => enso_descriptor()?,
        "iod" => iod_descriptor()?,
        other => bail!("unknown climate index {other}"),
    };
    loader::download(&desc, cache_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Source;
    use crate::testutil::StubServer;
    use arrow::array::Array;
    use chrono::NaiveDate;

    const MEI: &str = "  1979  2024
  1979   0.47   0.29  -0.05   0.21   0.27  -0.11  -0.11   0.47   0.38   0.23   0.53   0.63
  1980   0.53   0.41   0.30   0.47   0.92   0.95   0.63   0.28   0.09   0.18   0.27   0.09
  -999.00
  Multivariate ENSO Index Version 2 (MEI.v2)
  https://psl.noaa.gov/enso/mei/
";

    #[test]
    fn monthly_rows_are_flattened() -> Result<()> {
        let server = StubServer::start(vec![("/enso/meiv2.data", MEI.as_bytes().to_vec())]);
        let mut desc = enso_descriptor()?;
        desc.source = Source::Http {
            url: server.url("/enso/{filename}"),
            query: Default::default(),
        };
        let dir = tempfile::tempdir()?;
        let table = load_with(&desc, dir.path())?.expect("served");

        assert!(dir.path().join("oscillations/meiv2.data").is_file());
        assert_eq!(table.column_names(), vec!["time", "enso"]);
        assert_eq!(table.num_rows(), 24);
        let enso = table.f64_column("enso").unwrap();
        assert_eq!(enso.value(2), -0.05);
        assert_eq!(enso.value(23), 0.09);
        assert_eq!(
            table.times()[13],
            NaiveDate::from_ymd_opt(1980, 2, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        Ok(())
    }

    #[test]
    fn missing_months_are_null() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let desc = iod_descriptor()?;
        let path = desc.raw_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(
            &path,
            " 1870 2023\n 2023  0.1  0.2  0.3  0.4  0.5  0.6  0.7  0.8  0.9  1.0 -9999.000 -9999.000\n -9999\n",
        )?;
        let table = load_with(&desc, dir.path())?.expect("cached");
        let iod = table.f64_column("iod").unwrap();
        assert_eq!(iod.len(), 12);
        assert!(iod.is_null(10) && iod.is_null(11));
        assert!(!table.has_column("lat"));
        Ok(())
    }

    #[test]
    fn unknown_index_name() {
        assert!(download("pdo", Path::new("/tmp")).is_err());
    }
}
