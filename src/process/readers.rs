//! Format readers: turn a cached raw file into a [`RawTable`].

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, instrument};

use super::RawTable;
use crate::descriptor::{Compression, Descriptor, Format};

/// Read `path` according to the descriptor's format and compression.
#[instrument(level = "debug", skip_all, fields(dataset = %desc.name, path = %path.display()))]
pub fn read_raw(desc: &Descriptor, path: &Path) -> Result<RawTable> {
    let table = match &desc.format {
        Format::SentinelDelimited {
            sentinel,
            delimiter,
        } => read_sentinel_delimited(open_text(path, desc.compression)?, sentinel, *delimiter),
        Format::TrailingFields {
            count,
            min_fields,
            delimiter,
        } => read_trailing_fields(open_text(path, desc.compression)?, *count, *min_fields, *delimiter),
        Format::Excel => read_excel(path),
        Format::Whitespace { skip_rows, names } => {
            read_whitespace(open_text(path, desc.compression)?, *skip_rows, names)
        }
        Format::Csv => read_csv(open_text(path, desc.compression)?, b','),
        Format::MonthlyMatrix => read_monthly_matrix(open_text(path, desc.compression)?),
    }
    .with_context(|| format!("parsing {}", path.display()))?;
    debug!(rows = table.len(), columns = table.headers.len(), "read raw table");
    Ok(table)
}

/// Open a text file, decompressing gzip on the fly.
pub fn open_text(path: &Path, compression: Compression) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(match compression {
        Compression::None => Box::new(BufReader::new(file)),
        Compression::Gzip => Box::new(BufReader::new(GzDecoder::new(file))),
    })
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter).map_err(|_| anyhow!("delimiter {delimiter:?} is not a single byte"))
}

/// Skip the free-text preamble up to and including the line containing `sentinel`, then read
/// the rest as a delimited table with a header row.
pub fn read_sentinel_delimited(
    mut reader: Box<dyn BufRead>,
    sentinel: &str,
    delimiter: char,
) -> Result<RawTable> {
    let mut line = String::new();
    let mut skipped = 0usize;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("end of file before the preamble terminator {sentinel:?}");
        }
        skipped += 1;
        if line.contains(sentinel) {
            break;
        }
    }
    debug!(skipped, "skipped preamble");
    read_delimited(reader, delimiter_byte(delimiter)?)
}

fn read_delimited(reader: Box<dyn BufRead>, delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = RawTable::new(headers);
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("parse error at record {}", idx + 1))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        table
            .push_row(record.iter().map(str::to_string).collect())
            .with_context(|| format!("record {}", idx + 1))?;
    }
    Ok(table)
}

pub fn read_csv(reader: Box<dyn BufRead>, delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = RawTable::new(headers);
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx + 1))?;
        table
            .push_row(record.iter().map(str::to_string).collect())
            .with_context(|| format!("record {}", idx + 1))?;
    }
    Ok(table)
}

/// Lines split on `delimiter`; only lines with more than `min_fields` parts are kept, each
/// reduced to its last `count` parts. The first kept line is the header.
pub fn read_trailing_fields(
    reader: Box<dyn BufRead>,
    count: usize,
    min_fields: usize,
    delimiter: char,
) -> Result<RawTable> {
    let mut table: Option<RawTable> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", idx + 1))?;
        let line = line.trim_end_matches(['\r', '\n']);
        let parts: Vec<&str> = line.split(delimiter).collect();
        if parts.len() <= min_fields {
            continue;
        }
        let tail: Vec<String> = parts[parts.len().saturating_sub(count)..]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match table.as_mut() {
            None => {
                table = Some(RawTable::new(tail.iter().map(|h| h.trim().to_string()).collect()))
            }
            Some(t) => t
                .push_row(tail)
                .with_context(|| format!("line {}", idx + 1))?,
        }
    }
    table.ok_or_else(|| anyhow!("no line has more than {min_fields} fields"))
}

/// First worksheet of an Excel workbook; the first row is the header.
pub fn read_excel(path: &Path) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .context("reading first worksheet")?;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("worksheet is empty"))?
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();
    let mut table = RawTable::new(headers);
    for (idx, row) in rows.enumerate() {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        table
            .push_row(cells)
            .with_context(|| format!("worksheet row {}", idx + 2))?;
    }
    Ok(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Positional whitespace-separated columns after `skip_rows` preamble lines.
pub fn read_whitespace(reader: Box<dyn BufRead>, skip_rows: usize, names: &[String]) -> Result<RawTable> {
    let mut table = RawTable::new(names.to_vec());
    for (idx, line) in reader.lines().enumerate().skip(skip_rows) {
        let line = line.with_context(|| format!("reading line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        table
            .push_row(line.split_whitespace().map(str::to_string).collect())
            .with_context(|| format!("line {}", idx + 1))?;
    }
    Ok(table)
}

/// NOAA PSL climate-index layout: a year-range line, then `year v1 .. v12` rows, then a
/// free-text footer. Emits long-form `year, month, value` rows in calendar order.
pub fn read_monthly_matrix(reader: Box<dyn BufRead>) -> Result<RawTable> {
    let mut table = RawTable::new(vec!["year".into(), "month".into(), "value".into()]);
    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line.with_context(|| format!("reading line {}", idx + 1))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let is_row = tokens.len() == 13
            && tokens[0].len() == 4
            && tokens[0].chars().all(|c| c.is_ascii_digit());
        if !is_row {
            debug!(line = idx + 1, "end of monthly rows");
            break;
        }
        for (month, value) in tokens[1..].iter().enumerate() {
            table.push_row(vec![
                tokens[0].to_string(),
                (month + 1).to_string(),
                value.to_string(),
            ])?;
        }
    }
    if table.is_empty() {
        bail!("no monthly rows found");
    }
    Ok(table)
}
