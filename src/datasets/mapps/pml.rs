// src/datasets/mapps/pml.rs
//! PML release of the MAPPS compilation, published as a plain CSV.

use anyhow::Result;
use std::path::Path;

use crate::datasets::{builtin, resolve};
use crate::descriptor::Descriptor;
use crate::loader;
use crate::table::Table;

pub fn descriptor() -> Result<Descriptor> {
    builtin("mapps_pml")
}

pub fn load(cache_dir: &Path, filename: Option<&str>) -> Result<Option<Table>> {
    load_with(&resolve(&descriptor()?, filename), cache_dir)
}

pub fn load_with(desc: &Descriptor, cache_dir: &Path) -> Result<Option<Table>> {
    loader::load(desc, cache_dir)
}

pub fn download(cache_dir: &Path, filename: Option<&str>) -> Result<bool> {
    loader::download(&resolve(&descriptor()?, filename), cache_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::NaiveDate;

    const CSV: &str = "\
YEAR,MONTH,DAY,LAT,LON,DEPTH,TEMP,TCHL,ALPHA,PMB,EK,NITRATE,SILICATE,PHOSPHATE,PROVNUM
1992,7,14,50.2,-145.0,5,11.3,0.6,0.035,3.1,88.6,,,,15
2001,1,3,-33.5,151.4,20,21.0,0.2,0.041,5.2,126.8,0.1,1.2,0.05,31
";

    #[test]
    fn date_parts_become_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let desc = descriptor()?;
        let path = desc.raw_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(&path, CSV)?;

        // already cached: no request is made
        let table = load_with(&desc, dir.path())?.expect("cached");
        assert_eq!(
            table.column_names(),
            vec!["time", "lat", "lon", "depth", "temp", "chl", "alpha", "PBmax", "Ek", "NO3", "Si4", "PO4", "region"]
        );
        assert_eq!(
            table.times()[0],
            NaiveDate::from_ymd_opt(1992, 7, 14).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(table.f64_column("NO3").unwrap().is_null(0));
        Ok(())
    }
}
