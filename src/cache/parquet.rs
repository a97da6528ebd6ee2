// src/cache/parquet.rs
//
// Derived caches: normalized tables persisted as Parquet so expensive parses run once.

use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs, fs::File, path::Path};
use tracing::{debug, instrument};

use crate::table::Table;

#[instrument(level = "info", skip(table), fields(rows = table.num_rows()))]
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, table.batch().schema(), Some(props))
        .context("creating Arrow writer for derived cache")?;
    writer.write(table.batch()).context("writing derived cache batch")?;
    writer.close().context("closing derived cache writer")?;
    Ok(())
}

#[instrument(level = "debug")]
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;
    let batches = reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .with_context(|| format!("decoding {}", path.display()))?;
    if batches.is_empty() && schema.fields().is_empty() {
        bail!("{} holds no columns", path.display());
    }
    let batch = arrow::compute::concat_batches(&schema, &batches)?;
    debug!(rows = batch.num_rows(), "read derived cache");
    Table::try_new(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array};
    use std::sync::Arc;

    #[test]
    fn derived_cache_preserves_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/t.parquet");
        let table = Table::from_columns(
            vec![Some(1_000), None],
            vec![
                ("lat".into(), Arc::new(Float64Array::from(vec![Some(1.0), None])) as ArrayRef),
                ("lon".into(), Arc::new(Float64Array::from(vec![2.0, 3.0])) as ArrayRef),
            ],
        )?;
        write_table(&path, &table)?;
        let back = read_table(&path)?;
        assert_eq!(back, table);
        Ok(())
    }
}
