//! The generic normalizer: a [`RawTable`] plus a [`Descriptor`] in, a [`Table`] out.

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, instrument, warn};

use super::{
    date_parser::{from_parts_millis, parse_timestamp_millis},
    utils::{clean_str, coerce_int, infer_arrow_dtype, parse_f64},
    RawTable,
};
use crate::{
    descriptor::{Descriptor, IndexSpec, LonWrap},
    table::{index_field, Table, INDEX},
};

/// Rename, prune, index and type a raw table as the descriptor says.
#[instrument(level = "debug", skip_all, fields(dataset = %desc.name, rows = raw.len()))]
pub fn normalize(desc: &Descriptor, mut raw: RawTable) -> Result<Table> {
    blank_na_values(&mut raw, &desc.na_values);

    if let Some(keep) = &desc.keep {
        for name in keep {
            if raw.position(name).is_none() {
                bail!("column {name:?} not found in {}", desc.name);
            }
        }
        let flags: Vec<bool> = raw.headers.iter().map(|h| keep.contains(h)).collect();
        raw.retain_columns(&flags);
    }

    // A positional index is pinned to its source label before anything is renamed.
    let index_label = match &desc.index {
        IndexSpec::Position { position, .. } => Some(
            raw.headers
                .get(*position)
                .cloned()
                .ok_or_else(|| anyhow!("index position {position} is past the last column"))?,
        ),
        _ => None,
    };

    drop_columns(&mut raw, desc, index_label.as_deref());

    for (from, to) in &desc.rename {
        raw.rename(from, to);
    }
    warn_duplicates(&raw.headers, &desc.name);

    let index = match &desc.index {
        IndexSpec::Column {
            name,
            dayfirst,
            format,
        } => take_datetime_column(&mut raw, name, *dayfirst, format.as_deref())?,
        IndexSpec::Position { dayfirst, .. } => {
            let label = index_label.as_deref().unwrap_or_default();
            let name = desc.rename.get(label).map(String::as_str).unwrap_or(label);
            take_datetime_column(&mut raw, name, *dayfirst, None)?
        }
        IndexSpec::Parts {
            year,
            month,
            day,
            hour,
        } => take_parts(&mut raw, year, month, day.as_deref(), hour.as_deref())?,
    };

    if raw.position(INDEX).is_some() {
        bail!("{}: column {INDEX:?} collides with the index; rename it", desc.name);
    }

    let mut fields = vec![index_field()];
    let mut arrays: Vec<ArrayRef> =
        vec![Arc::new(TimestampMillisecondArray::from(index).with_timezone("UTC"))];

    for (idx, name) in raw.headers.iter().enumerate() {
        let cells = raw.rows.iter().map(|r| r[idx].as_str());
        let array: ArrayRef = if desc.timestamp_columns.contains(name) {
            let values = cells
                .map(|c| parse_timestamp_millis(c, false, None))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("parsing timestamp column {name}"))?;
            Arc::new(TimestampMillisecondArray::from(values).with_timezone("UTC"))
        } else if desc.text_columns.contains(name) {
            Arc::new(StringArray::from(cells.map(text_cell).collect::<Vec<_>>()))
        } else {
            match infer_arrow_dtype(cells.clone()) {
                DataType::Float64 => {
                    let wrap = if name == "lon" { desc.lon_wrap } else { LonWrap::None };
                    Arc::new(Float64Array::from(
                        cells.map(|c| parse_f64(c).map(|v| wrap.apply(v))).collect::<Vec<_>>(),
                    ))
                }
                _ => Arc::new(StringArray::from(cells.map(text_cell).collect::<Vec<_>>())),
            }
        };
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    for (name, value) in &desc.constants {
        if raw.position(name).is_some() {
            continue;
        }
        fields.push(Field::new(name, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(vec![*value; raw.len()])));
    }

    if desc.timestamp_columns.iter().any(|c| raw.position(c).is_none()) {
        debug!("some declared timestamp columns are absent");
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .with_context(|| format!("assembling {} table", desc.name))?;
    let table = Table::try_new(batch)?;
    if desc.spatial {
        table
            .ensure_spatial()
            .with_context(|| format!("{} table", desc.name))?;
    }
    debug!(rows = table.num_rows(), columns = table.column_names().len(), "normalized");
    Ok(table)
}

fn text_cell(c: &str) -> Option<String> {
    let c = clean_str(c);
    (!c.is_empty()).then_some(c)
}

/// Replace NA markers with empty cells. Numeric markers also match numerically, so `-9`
/// covers `-9.0`.
pub fn blank_na_values(raw: &mut RawTable, na_values: &[String]) {
    if na_values.is_empty() {
        return;
    }
    let numeric: Vec<f64> = na_values.iter().filter_map(|v| v.parse().ok()).collect();
    for row in &mut raw.rows {
        for cell in row.iter_mut() {
            let c = cell.trim();
            let is_na = na_values.iter().any(|na| na == c)
                || c.parse::<f64>().map(|v| numeric.contains(&v)).unwrap_or(false);
            if is_na {
                cell.clear();
            }
        }
    }
}

fn drop_columns(raw: &mut RawTable, desc: &Descriptor, protect: Option<&str>) {
    let flags: Vec<bool> = raw
        .headers
        .iter()
        .map(|h| {
            if Some(h.as_str()) == protect {
                return true;
            }
            let listed = desc.drop.contains(h);
            let patterned = desc.drop_patterns.iter().any(|p| h.contains(p.as_str()));
            !(listed || patterned)
        })
        .collect();
    let dropped = flags.iter().filter(|k| !**k).count();
    let missing: Vec<&String> = desc
        .drop
        .iter()
        .filter(|d| raw.position(d).is_none())
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "columns listed for dropping are absent");
    }
    raw.retain_columns(&flags);
    debug!(dropped, "dropped columns");
}

fn warn_duplicates(headers: &[String], dataset: &str) {
    let mut seen = HashSet::new();
    for h in headers {
        if !seen.insert(h) {
            warn!(dataset, column = %h, "duplicate column name after renaming");
        }
    }
}

fn take_datetime_column(
    raw: &mut RawTable,
    name: &str,
    dayfirst: bool,
    format: Option<&str>,
) -> Result<Vec<Option<i64>>> {
    let cells = raw
        .column(name)
        .ok_or_else(|| anyhow!("index column {name:?} not found"))?;
    let values = cells
        .enumerate()
        .map(|(i, c)| {
            parse_timestamp_millis(c, dayfirst, format).with_context(|| format!("row {}", i + 1))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("parsing index column {name}"))?;
    raw.remove_columns(&[name]);
    Ok(values)
}

fn take_parts(
    raw: &mut RawTable,
    year: &str,
    month: &str,
    day: Option<&str>,
    hour: Option<&str>,
) -> Result<Vec<Option<i64>>> {
    let pos = |name: &str| {
        raw.position(name)
            .ok_or_else(|| anyhow!("date part column {name:?} not found"))
    };
    let y = pos(year)?;
    let m = pos(month)?;
    let d = day.map(pos).transpose()?;
    let h = hour.map(pos).transpose()?;

    let mut out = Vec::with_capacity(raw.len());
    for (i, row) in raw.rows.iter().enumerate() {
        let part = |idx: Option<usize>, default: i64| -> Result<Option<i64>> {
            let Some(idx) = idx else {
                return Ok(Some(default));
            };
            let cell = row[idx].trim();
            if cell.is_empty() {
                return Ok(None);
            }
            coerce_int(cell)
                .map(Some)
                .ok_or_else(|| anyhow!("row {}: {:?} is not an integer", i + 1, cell))
        };
        let millis = match (part(Some(y), 0)?, part(Some(m), 0)?, part(d, 1)?, part(h, 0)?) {
            (Some(y), Some(m), Some(d), Some(h)) => Some(
                from_parts_millis(y, m, d, h)
                    .ok_or_else(|| anyhow!("row {}: invalid date {y}-{m}-{d} {h}h", i + 1))?,
            ),
            _ => None,
        };
        out.push(millis);
    }

    let mut parts = vec![year, month];
    parts.extend(day);
    parts.extend(hour);
    raw.remove_columns(&parts);
    Ok(out)
}
