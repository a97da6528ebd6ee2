// src/process/mod.rs
use anyhow::{bail, Result};

pub mod date_parser;
pub mod normalize;
pub mod readers;
pub mod utils;

pub use normalize::normalize;
pub use readers::read_raw;

/// A raw table as read from a cached file, before any renaming or typing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names, from the header row or the descriptor's positional names.
    pub headers: Vec<String>,
    /// Each data row, one string per header. Short rows are padded with empty cells.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding it to the header width. Rows wider than the header are an error.
    pub fn push_row(&mut self, mut row: Vec<String>) -> Result<()> {
        if row.len() > self.headers.len() {
            bail!(
                "row {} has {} fields but the header has {}",
                self.rows.len() + 1,
                row.len(),
                self.headers.len()
            );
        }
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
        Ok(())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.position(name)?;
        Some(self.rows.iter().map(move |r| r[idx].as_str()))
    }

    /// Append a derived column.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            bail!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        if self.position(&name).is_some() {
            bail!("column {name} already exists");
        }
        self.headers.push(name);
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(())
    }

    /// Overwrite an existing column in place.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        let Some(idx) = self.position(name) else {
            bail!("no column named {name}");
        };
        if values.len() != self.rows.len() {
            bail!("column {name} has {} values for {} rows", values.len(), self.rows.len());
        }
        for (row, v) in self.rows.iter_mut().zip(values) {
            row[idx] = v;
        }
        Ok(())
    }

    /// Remove columns by name; names not present are ignored.
    pub fn remove_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !names.contains(&h.as_str()))
            .collect();
        self.retain_columns(&keep);
    }

    /// Keep only columns whose flag is set.
    pub fn retain_columns(&mut self, keep: &[bool]) {
        let filter = |cells: &mut Vec<String>| {
            let mut i = 0;
            cells.retain(|_| {
                let k = keep.get(i).copied().unwrap_or(true);
                i += 1;
                k
            });
        };
        filter(&mut self.headers);
        for row in &mut self.rows {
            filter(row);
        }
    }

    /// Keep rows for which `pred` holds.
    pub fn retain_rows(&mut self, pred: impl FnMut(&Vec<String>) -> bool) {
        self.rows.retain(pred);
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.position(from) {
            self.headers[idx] = to.to_string();
        }
    }

    /// Append the rows of `other`, which must share the same headers.
    pub fn extend(&mut self, other: RawTable) -> Result<()> {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.headers != self.headers {
            bail!("cannot append a table with different headers");
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
