use anyhow::{bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray, TimestampMillisecondArray},
    compute::concat_batches,
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, NaiveDateTime};
use std::sync::Arc;

/// Name of the timestamp index column, always the first column of a [`Table`].
pub const INDEX: &str = "time";

pub fn index_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some(Arc::from("UTC")))
}

pub fn index_field() -> Field {
    Field::new(INDEX, index_type(), true)
}

/// A normalized dataset: a `time` index followed by measurement columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap `batch`, checking that its first column is the timestamp index.
    pub fn try_new(batch: RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let first = match schema.fields().first() {
            Some(f) => f,
            None => bail!("table has no columns"),
        };
        if first.name() != INDEX
            || !matches!(first.data_type(), DataType::Timestamp(TimeUnit::Millisecond, _))
        {
            bail!(
                "first column must be a millisecond timestamp `{}`, found `{}` ({})",
                INDEX,
                first.name(),
                first.data_type()
            );
        }
        Ok(Self { batch })
    }

    /// Check the `lat`/`lon` invariant every dataset table carries.
    pub fn ensure_spatial(&self) -> Result<()> {
        for name in ["lat", "lon"] {
            if self.f64_column(name).is_none() {
                bail!("table is missing a numeric `{name}` column");
            }
        }
        Ok(())
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        let idx = self.batch.schema().index_of(name).ok()?;
        Some(self.batch.column(idx))
    }

    pub fn index(&self) -> &TimestampMillisecondArray {
        self.batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .expect("index column is validated in try_new")
    }

    pub fn times(&self) -> Vec<Option<NaiveDateTime>> {
        self.index()
            .iter()
            .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|d| d.naive_utc()))
            .collect()
    }

    /// First and last non-null index values.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let times: Vec<NaiveDateTime> = self.times().into_iter().flatten().collect();
        Some((*times.iter().min()?, *times.iter().max()?))
    }

    pub fn f64_column(&self, name: &str) -> Option<&Float64Array> {
        self.column(name)?.as_any().downcast_ref::<Float64Array>()
    }

    pub fn str_column(&self, name: &str) -> Option<&StringArray> {
        self.column(name)?.as_any().downcast_ref::<StringArray>()
    }

    /// Copy of the table without `names`. The index cannot be removed.
    pub fn without(&self, names: &[&str]) -> Result<Table> {
        if names.contains(&INDEX) {
            bail!("cannot drop the `{INDEX}` index");
        }
        let schema = self.batch.schema();
        let keep: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !names.contains(&f.name().as_str()))
            .map(|(i, _)| i)
            .collect();
        let batch = self.batch.project(&keep).context("projecting table columns")?;
        Table::try_new(batch)
    }

    /// Stack tables with identical schemas, preserving order.
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let first = match tables.first() {
            Some(t) => t,
            None => bail!("nothing to concatenate"),
        };
        let schema = first.batch.schema();
        for (i, t) in tables.iter().enumerate().skip(1) {
            if t.batch.schema().fields() != schema.fields() {
                bail!("table #{i} has a different schema than table #0");
            }
        }
        let batches: Vec<RecordBatch> = tables.iter().map(|t| t.batch.clone()).collect();
        let batch = concat_batches(&schema, &batches).context("concatenating tables")?;
        Table::try_new(batch)
    }

    /// Build a table from an index and named columns. Mainly for callers assembling tables
    /// by hand.
    pub fn from_columns(index: Vec<Option<i64>>, columns: Vec<(String, ArrayRef)>) -> Result<Table> {
        let mut fields = vec![index_field()];
        let mut arrays: Vec<ArrayRef> =
            vec![Arc::new(TimestampMillisecondArray::from(index).with_timezone("UTC"))];
        for (name, arr) in columns {
            fields.push(Field::new(name, arr.data_type().clone(), true));
            arrays.push(arr);
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .context("assembling table")?;
        Table::try_new(batch)
    }
}
