//! Wide-CSV normalization for uploaded sales files
//!
//! A wide sales file has one `Date` column followed by one column per item.
//! Two header shapes are accepted:
//!
//! - a single header row: `Date,Cappuccino,Americano`
//! - a two-row header, where the first row carries a generic `Number Sold`
//!   label and the second row supplies the real item names:
//!   ```text
//!   Date,Number Sold,
//!   ,Cappuccino,Americano
//!   ```
//!
//! Parsing is a pure function of (bytes, filename); no disk or network
//! access happens here.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// Normalized representation of a wide sales CSV:
/// dates as ISO `YYYY-MM-DD` strings, one quantity per item column,
/// row values positionally aligned with `item_names`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSalesCsv {
    /// Item column names, in file order
    pub item_names: Vec<String>,
    /// (iso_date, quantities) tuples, in file order
    pub rows: Vec<(String, Vec<u32>)>,
}

/// Decode raw upload bytes: UTF-8 (BOM tolerated) with a Latin-1 fallback.
fn decode_bytes(raw: &[u8]) -> String {
    let raw = raw.strip_prefix(b"\xef\xbb\xbf").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

/// Collapse runs of whitespace inside a header cell and trim it.
fn clean_header_cell(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a `DD/MM/YYYY` date cell into an ISO `YYYY-MM-DD` string.
///
/// Day and month must be zero-padded two digits and the year four digits;
/// any other shape is rejected.
fn parse_ddmmyyyy(cell: &str) -> Result<String> {
    let s = cell.trim();
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shape_ok {
        return Err(ForecastError::MalformedInput(format!(
            "invalid date format (expected DD/MM/YYYY): {s:?}"
        )));
    }
    let date = NaiveDate::parse_from_str(s, "%d/%m/%Y").map_err(|_| {
        ForecastError::MalformedInput(format!("invalid calendar date: {s:?}"))
    })?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Parse a quantity cell into a non-negative integer.
///
/// Numeric strings with a fractional part are truncated, so `"12.0"` is
/// accepted as 12. Empty and negative cells are rejected.
fn parse_quantity(cell: &str) -> Result<u32> {
    let s = cell.trim();
    if s.is_empty() {
        return Err(ForecastError::MalformedInput(
            "empty quantity cell".to_string(),
        ));
    }
    let v: f64 = s
        .parse()
        .map_err(|_| ForecastError::MalformedInput(format!("invalid quantity: {s:?}")))?;
    if !v.is_finite() {
        return Err(ForecastError::MalformedInput(format!(
            "invalid quantity: {s:?}"
        )));
    }
    let truncated = v.trunc();
    if truncated < 0.0 {
        return Err(ForecastError::MalformedInput(format!(
            "quantity must be >= 0, got {truncated}"
        )));
    }
    Ok(truncated as u32)
}

/// Keep an item column only if its header names a real column.
fn is_item_header(cell: &str) -> bool {
    !cell.is_empty() && !cell.to_lowercase().starts_with("unnamed")
}

/// Parse raw wide-CSV bytes into a [`ParsedSalesCsv`].
pub fn parse_wide_csv(raw: &[u8]) -> Result<ParsedSalesCsv> {
    let text = decode_bytes(raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| ForecastError::MalformedInput(format!("unreadable CSV row: {e}")))?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.iter().any(|c| !c.trim().is_empty()) {
            rows.push(cells);
        }
    }

    if rows.len() < 2 {
        return Err(ForecastError::MalformedInput(
            "CSV must have a header row and at least one data row".to_string(),
        ));
    }

    let header1: Vec<String> = rows[0].iter().map(|c| clean_header_cell(c)).collect();

    // Two-row header: row 1 starts with Date and carries a generic
    // "Number Sold" label, row 2 has a blank first cell and the item names.
    let mut header2: Option<Vec<String>> = None;
    if rows.len() >= 3 {
        let maybe: Vec<String> = rows[1].iter().map(|c| clean_header_cell(c)).collect();
        let generic_label = header1
            .iter()
            .any(|h| h.to_lowercase().contains("number sold"));
        if header1
            .first()
            .is_some_and(|h| h.eq_ignore_ascii_case("date"))
            && maybe.first().is_some_and(|h| h.is_empty())
            && generic_label
        {
            header2 = Some(maybe);
        }
    }

    let (item_names, data_start_idx) = match header2 {
        Some(h2) => {
            let names: Vec<String> = h2[1..]
                .iter()
                .filter(|h| is_item_header(h))
                .cloned()
                .collect();
            (names, 2)
        }
        None => {
            if !header1
                .first()
                .is_some_and(|h| h.eq_ignore_ascii_case("date"))
            {
                return Err(ForecastError::MalformedInput(
                    "first column must be 'Date'".to_string(),
                ));
            }
            let names: Vec<String> = header1[1..]
                .iter()
                .filter(|h| is_item_header(h))
                .cloned()
                .collect();
            (names, 1)
        }
    };

    if item_names.is_empty() {
        return Err(ForecastError::MalformedInput(
            "no item columns found (expected at least one column after Date)".to_string(),
        ));
    }

    let mut parsed_rows: Vec<(String, Vec<u32>)> = Vec::new();
    for row in &rows[data_start_idx..] {
        let date_iso = parse_ddmmyyyy(row.first().map(String::as_str).unwrap_or(""))?;
        let mut quantities = Vec::with_capacity(item_names.len());
        for idx in 1..=item_names.len() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            quantities.push(parse_quantity(cell)?);
        }
        parsed_rows.push((date_iso, quantities));
    }

    if parsed_rows.is_empty() {
        return Err(ForecastError::MalformedInput(
            "CSV contains no data rows".to_string(),
        ));
    }

    Ok(ParsedSalesCsv {
        item_names,
        rows: parsed_rows,
    })
}

/// Infer an item name from a source filename for single-column count files.
///
/// `"Pink CroissantSales March - Oct 2025.csv"` becomes `"Croissant"`:
/// the extension and the known vendor prefix are stripped and everything
/// from the first `Sales` marker onward is cut.
pub fn infer_item_name_from_filename(filename: &str) -> String {
    let mut base = filename.trim().to_string();
    if base.to_lowercase().ends_with(".csv") {
        base.truncate(base.len() - 4);
    }
    base = base.replace("Pink ", "");
    if let Some(pos) = base.to_lowercase().find("sales") {
        base.truncate(pos);
    }
    let base = base.trim();
    if base.is_empty() {
        "item".to_string()
    } else {
        base.to_string()
    }
}

/// Replace a lone generic "Number Sold" column with a name inferred from
/// the source filename. Files with real item headers pass through untouched.
pub fn normalize_count_column(parsed: ParsedSalesCsv, filename: &str) -> ParsedSalesCsv {
    if parsed.item_names.len() == 1 && parsed.item_names[0].to_lowercase() == "number sold" {
        let item = infer_item_name_from_filename(filename);
        log::debug!("normalized count column to item name {item:?}");
        return ParsedSalesCsv {
            item_names: vec![item],
            rows: parsed.rows,
        };
    }
    parsed
}
