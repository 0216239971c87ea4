//! Spreadsheet extractors: CSV and XLSX.
//!
//! Both produce one line per row with cells separated by tabs. XLSX only
//! reads the shared string table, which is where Excel keeps every text cell;
//! numeric cells carry no classification signal.

use super::document::{open_archive, read_part, unescape_xml};
use super::{ExtractionError, TextExtractor};
use once_cell::sync::Lazy;
use regex::Regex;

/// `<si>` entries of `xl/sharedStrings.xml`.
static SHARED_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<si>(.*?)</si>").unwrap_or_else(|e| panic!("shared string pattern: {e}"))
});

static STRING_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").unwrap_or_else(|e| panic!("string run pattern: {e}"))
});

pub struct CsvExtractor;

impl TextExtractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &[&'static str] {
        &["csv", "tsv"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let delimiter = sniff_delimiter(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(bytes);

        let mut text = String::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| ExtractionError::malformed("csv", e))?;
            let cells: Vec<String> = record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
                .collect();
            text.push_str(&cells.join("\t"));
            text.push('\n');
        }
        Ok(text)
    }
}

/// Tab when the first line has more tabs than commas.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let tabs = first_line.iter().filter(|b| **b == b'\t').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

pub struct XlsxExtractor;

impl TextExtractor for XlsxExtractor {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["xlsx"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = open_archive(bytes, "xlsx")?;
        if !archive.file_names().any(|name| name == "xl/workbook.xml") {
            return Err(ExtractionError::malformed("xlsx", "no workbook part"));
        }
        // A workbook with only numbers has no shared strings part.
        if !archive.file_names().any(|name| name == "xl/sharedStrings.xml") {
            return Ok(String::new());
        }

        let xml = read_part(&mut archive, "xl/sharedStrings.xml", "xlsx")?;
        let mut text = String::new();
        for item in SHARED_STRING.captures_iter(&xml) {
            let Some(body) = item.get(1) else { continue };
            for run in STRING_RUN.captures_iter(body.as_str()) {
                if let Some(value) = run.get(1) {
                    text.push_str(&unescape_xml(value.as_str()));
                }
            }
            text.push('\n');
        }
        Ok(text)
    }
}
