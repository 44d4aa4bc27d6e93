//! CSV source loading: column mapping, text decoding and amount parsing.

use std::path::Path;

use crate::config::{ContributionColumns, ExpenseColumns};
use crate::error::FusionError;
use crate::model::{RawContribution, RawExpense};
use crate::reference::ContribTypeEntry;

/// Read a source or config file as text. A UTF-8 BOM is dropped; bytes
/// that are not valid UTF-8 are decoded as Windows-1252 (Excel exports).
pub fn read_source_text(path: &Path) -> Result<String, FusionError> {
    let bytes = std::fs::read(path).map_err(|e| FusionError::Io(format!("{}: {e}", path.display())))?;
    let (text, malformed) = encoding_rs::UTF_8.decode_with_bom_removal(&bytes);
    if !malformed {
        return Ok(text.into_owned());
    }
    log::debug!("{}: not UTF-8, decoded as Windows-1252", path.display());
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&bytes);
    Ok(text.into_owned())
}

/// Parse a numeric-like cell into cents.
///
/// Accepts comma/space thousands separators, a leading `-` or surrounding
/// parentheses for negatives, and `-`, `N/A` or an empty cell for zero.
/// Digits past the second decimal round half away from zero.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let text = raw.trim();
    if text.is_empty() || text == "-" || text.eq_ignore_ascii_case("n/a") {
        return Some(0);
    }

    let (negative, body) = if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        (true, inner.trim())
    } else if let Some(rest) = text.strip_prefix('-') {
        (true, rest.trim_start())
    } else {
        (false, text.strip_prefix('+').unwrap_or(text))
    };

    let digits: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}'))
        .collect();
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
    let tenths = frac_digits.next().unwrap_or(0);
    let hundredths = frac_digits.next().unwrap_or(0);
    let round_up = frac_digits.next().is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;
    Some(if negative { -cents } else { cents })
}

/// Parse a year cell. Spreadsheet exports sometimes write `2022.0`.
pub fn parse_year(raw: &str) -> Option<i32> {
    let text = raw.trim();
    let whole = match text.split_once('.') {
        Some((w, f)) if f.chars().all(|c| c == '0') => w,
        Some(_) => return None,
        None => text,
    };
    whole.parse().ok()
}

struct Header<'a> {
    table: &'a str,
    names: Vec<String>,
}

impl Header<'_> {
    fn index(&self, column: &str) -> Result<usize, FusionError> {
        self.names
            .iter()
            .position(|h| h == column.trim())
            .ok_or_else(|| FusionError::MissingColumn {
                table: self.table.into(),
                column: column.into(),
            })
    }

    fn optional(&self, column: Option<&String>) -> Result<Option<usize>, FusionError> {
        column.map(|c| self.index(c)).transpose()
    }
}

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// The delimiter that splits the header into the most fields while keeping
/// the sampled rows at the same width. Comma when nothing splits.
fn detect_delimiter(data: &str) -> u8 {
    let sample: Vec<&str> = data.lines().take(10).collect();
    let sample = sample.join("\n");
    let mut best = (0usize, b',');
    for delim in DELIMITERS {
        let widths: Vec<usize> = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes())
            .records()
            .filter_map(Result::ok)
            .map(|r| r.len())
            .collect();
        let Some(&header) = widths.first() else {
            continue;
        };
        if header <= 1 {
            continue;
        }
        let score = widths.iter().filter(|&&w| w == header).count() * header;
        if score > best.0 {
            best = (score, delim);
        }
    }
    best.1
}

/// CSV reader over in-memory table text. Drops a leading BOM and picks the
/// delimiter from the first lines.
fn reader(csv_data: &str) -> csv::Reader<&[u8]> {
    let data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(detect_delimiter(data))
        .from_reader(data.as_bytes())
}

fn header<'a>(table: &'a str, reader: &mut csv::Reader<&[u8]>) -> Result<Header<'a>, FusionError> {
    let names = reader
        .headers()
        .map_err(|e| FusionError::Io(format!("{table}: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    Ok(Header { table, names })
}

/// The fields every source row shares, parsed from one CSV record.
struct Common {
    entity: String,
    year: i32,
    amount_cents: i64,
}

fn common(
    table: &str,
    record: &csv::StringRecord,
    entity_idx: usize,
    year_idx: usize,
    amount_idx: usize,
) -> Result<Common, FusionError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let year_str = record.get(year_idx).unwrap_or("");
    let year = parse_year(year_str).ok_or_else(|| FusionError::YearParse {
        table: table.into(),
        line,
        value: year_str.into(),
    })?;
    let amount_str = record.get(amount_idx).unwrap_or("");
    let amount_cents = parse_amount_cents(amount_str).ok_or_else(|| FusionError::AmountParse {
        table: table.into(),
        line,
        value: amount_str.into(),
    })?;
    Ok(Common {
        entity: record.get(entity_idx).unwrap_or("").trim().to_string(),
        year,
        amount_cents,
    })
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i)).map(|v| v.trim().to_string())
}

/// Load revenue rows through a column mapping.
pub fn load_contributions(
    table: &str,
    csv_data: &str,
    columns: &ContributionColumns,
) -> Result<Vec<RawContribution>, FusionError> {
    let mut reader = reader(csv_data);
    let header = header(table, &mut reader)?;

    let entity_idx = header.index(&columns.entity)?;
    let year_idx = header.index(&columns.year)?;
    let amount_idx = header.index(&columns.amount)?;
    let donor_idx = header.optional(columns.donor.as_ref())?;
    let contrib_idx = header.optional(columns.contrib_type.as_ref())?;
    let rev_idx = header.optional(columns.rev_type.as_ref())?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FusionError::Io(format!("{table}: {e}")))?;
        if is_blank(&record) {
            continue;
        }
        let c = common(table, &record, entity_idx, year_idx, amount_idx)?;
        rows.push(RawContribution {
            entity_code: c.entity,
            donor_name_raw: cell(&record, donor_idx).unwrap_or_default(),
            contrib_type_raw: cell(&record, contrib_idx).filter(|v| !v.is_empty()),
            rev_type_raw: cell(&record, rev_idx).unwrap_or_default(),
            year: c.year,
            amount_cents: c.amount_cents,
        });
    }
    log::debug!("{table}: loaded {} rows", rows.len());
    Ok(rows)
}

/// Load expense rows through a column mapping.
pub fn load_expenses(
    table: &str,
    csv_data: &str,
    columns: &ExpenseColumns,
) -> Result<Vec<RawExpense>, FusionError> {
    let mut reader = reader(csv_data);
    let header = header(table, &mut reader)?;

    let entity_idx = header.index(&columns.entity)?;
    let year_idx = header.index(&columns.year)?;
    let amount_idx = header.index(&columns.amount)?;
    let source_idx = header.optional(columns.source_type.as_ref())?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FusionError::Io(format!("{table}: {e}")))?;
        if is_blank(&record) {
            continue;
        }
        let c = common(table, &record, entity_idx, year_idx, amount_idx)?;
        rows.push(RawExpense {
            entity_code: c.entity,
            year: c.year,
            amount_cents: c.amount_cents,
            source_type: cell(&record, source_idx).filter(|v| !v.is_empty()),
        });
    }
    log::debug!("{table}: loaded {} rows", rows.len());
    Ok(rows)
}

/// Load a `code,name,alt_descriptors` contribution-type table.
pub fn load_contrib_types(csv_data: &str) -> Result<Vec<ContribTypeEntry>, FusionError> {
    const TABLE: &str = "contrib_types";
    let mut reader = reader(csv_data);
    let header = header(TABLE, &mut reader)?;
    let code_idx = header.index("code")?;
    let name_idx = header.index("name")?;
    let alt_idx = header.index("alt_descriptors").ok();

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FusionError::Io(format!("{TABLE}: {e}")))?;
        let code = record.get(code_idx).unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }
        let name = record.get(name_idx).unwrap_or("").trim();
        let alt = cell(&record, alt_idx).unwrap_or_default();
        entries.push(ContribTypeEntry::new(code, name, &alt));
    }
    Ok(entries)
}
