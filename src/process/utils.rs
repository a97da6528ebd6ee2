use arrow::datatypes::DataType;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9-]").expect("valid regex"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a cell as `f64`, treating empty cells as missing.
pub fn parse_f64(raw: &str) -> Option<f64> {
    let c = clean_str(raw);
    if c.is_empty() {
        return None;
    }
    c.parse().ok()
}

/// Infer the Arrow dtype of a column from its non-empty cells. A column with no values at
/// all is numeric so that all-missing columns line up across files.
pub fn infer_arrow_dtype<'a>(cells: impl IntoIterator<Item = &'a str>) -> DataType {
    for cell in cells {
        let c = clean_str(cell);
        if !c.is_empty() && c.parse::<f64>().is_err() {
            return DataType::Utf8;
        }
    }
    DataType::Float64
}

/// Integer from a cell with marker characters around the digits, e.g. `"*1998"` or
/// `"1998.0"`.
pub fn coerce_int(raw: &str) -> Option<i64> {
    let c = clean_str(raw);
    if let Ok(f) = c.parse::<f64>() {
        return (f.fract() == 0.0).then_some(f as i64);
    }
    NON_DIGITS.replace_all(&c, "").parse().ok()
}
