//! Batch input parsing
//!
//! - [`parse_boxes`]: free-form packing-list text, one group per `BOX:` /
//!   `Brand` section
//! - [`parse_table`]: CSV with sniffed EAN / brand / box columns
//!
//! Neither function validates EAN check digits; the pipeline normalizes
//! every candidate on entry.

use crate::models::{BoxGroup, TableRow, EAN_LENGTH};
use eanscout_common::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Brand used when a section names none
pub const DEFAULT_BRAND: &str = "CELIO";

/// Box id used when a section carries no `BOX:` label
pub const UNKNOWN_BOX: &str = "Unknown";

static SECTION_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"Brand|BOX:").expect("valid regex"));
static BRAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"Brand\s+(\w+)").expect("valid regex"));
static BOX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"BOX:([0-9]+)").expect("valid regex"));
static QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TOTA\s+QTE\s+BOX\s+([0-9]+)").expect("valid regex"));
static EAN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{13}").expect("valid regex"));

const EAN_HEADERS: &[&str] = &["ean", "code", "barcode"];
const BRAND_HEADERS: &[&str] = &["brand", "marque", "marca"];
const BOX_HEADERS: &[&str] = &["box", "boite", "colis", "box_number"];

/// Split packing-list text into box groups
///
/// Text is cut immediately before every `Brand` or `BOX:` token. Sections
/// without a `BOX:<digits>` or `Brand <word>` label, and sections without
/// any 13-digit run, produce no group.
pub fn parse_boxes(text: &str) -> Vec<BoxGroup> {
    let mut cuts: Vec<usize> = SECTION_START.find_iter(text).map(|m| m.start()).collect();
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }
    cuts.push(text.len());

    cuts.windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|section| !section.is_empty())
        .filter(|section| BOX_ID.is_match(section) || BRAND.is_match(section))
        .filter_map(parse_section)
        .collect()
}

fn parse_section(section: &str) -> Option<BoxGroup> {
    let eans: Vec<String> = EAN_RUN
        .find_iter(section)
        .map(|m| m.as_str().to_string())
        .collect();

    if eans.is_empty() {
        debug!("Dropping box section without EANs");
        return None;
    }

    let brand = BRAND
        .captures(section)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| DEFAULT_BRAND.to_string());
    let box_id = BOX_ID
        .captures(section)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| UNKNOWN_BOX.to_string());
    let quantity = QUANTITY
        .captures(section)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    Some(BoxGroup {
        brand,
        box_id,
        quantity,
        eans,
    })
}

/// Parse CSV text with a header row
///
/// Columns are found by case-insensitive substring match on the header.
/// The EAN cell is stripped to digits; 13 digits are kept, longer values
/// truncated to 13, shorter rows skipped. Missing an EAN column is an error.
pub fn parse_table(csv_data: &str) -> Result<Vec<TableRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Unreadable CSV header: {}", e)))?
        .clone();

    let ean_col = find_column(&headers, EAN_HEADERS)
        .ok_or_else(|| Error::InvalidInput("CSV has no EAN column".to_string()))?;
    let brand_col = find_column(&headers, BRAND_HEADERS);
    let box_col = find_column(&headers, BOX_HEADERS);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unreadable CSV row {}: {}", line + 2, e);
                continue;
            }
        };

        let Some(ean) = record.get(ean_col).and_then(clean_ean) else {
            debug!("Skipping CSV row {} without a usable EAN", line + 2);
            continue;
        };

        rows.push(TableRow {
            ean,
            brand: optional_cell(&record, brand_col),
            box_id: optional_cell(&record, box_col),
        });
    }

    Ok(rows)
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.to_lowercase();
        candidates.iter().any(|name| header.contains(name))
    })
}

fn optional_cell(record: &csv::StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|col| record.get(col))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn clean_ean(cell: &str) -> Option<String> {
    let digits: String = cell.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= EAN_LENGTH {
        Some(digits[..EAN_LENGTH].to_string())
    } else {
        None
    }
}
