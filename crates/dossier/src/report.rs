//! Report assembly
//!
//! Joins each inventoried file with its classification and effort estimate
//! into one [`ReportRecord`]. The assembler does no scoring; it guarantees
//! one record per inventory entry, in inventory order.

use crate::classify::{ClassificationResult, UNCLASSIFIED};
use crate::effort::EffortEstimate;
use crate::error::{DossierError, Result};
use crate::inventory::Inventory;
use crate::types::FileRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Characters of extracted text kept per record when snippets are enabled.
const SNIPPET_CHARS: usize = 240;

/// Column order of the CSV export. Matches [`ReportRecord`] field order.
pub const CSV_HEADERS: &[&str] = &[
    "source",
    "path",
    "primary_category",
    "all_categories",
    "subcategory",
    "destination",
    "score",
    "rationale",
    "estimated_hours",
    "extraction_degraded",
    "status",
    "tagged",
    "effort_basis",
    "text_snippet",
];

/// Everything pass 2 produced for one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub record: FileRecord,
    pub classification: ClassificationResult,
    pub effort: EffortEstimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Scanned,
    /// Never analyzed (run cancelled before dispatch, or the task failed)
    NotScanned,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Scanned => "scanned",
            ScanStatus::NotScanned => "not_scanned",
        }
    }
}

/// One output row. Field order is part of the export format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub source: String,
    pub path: String,
    pub primary_category: String,
    pub all_categories: Vec<String>,
    pub subcategory: Option<String>,
    pub destination: Option<String>,
    pub score: f64,
    pub rationale: Vec<String>,
    pub estimated_hours: Option<f64>,
    pub extraction_degraded: bool,
    pub status: ScanStatus,
    /// Outcome reported by the tagging collaborator, if it ran
    pub tagged: Option<bool>,
    pub effort_basis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_snippet: Option<String>,
}

impl ReportRecord {
    pub fn is_unclassified(&self) -> bool {
        self.primary_category == UNCLASSIFIED
    }

    fn csv_row(&self) -> Vec<String> {
        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            self.source.clone(),
            self.path.clone(),
            self.primary_category.clone(),
            self.all_categories.join("; "),
            optional(&self.subcategory),
            optional(&self.destination),
            self.score.to_string(),
            self.rationale.join(" | "),
            self.estimated_hours.map(|h| h.to_string()).unwrap_or_default(),
            self.extraction_degraded.to_string(),
            self.status.as_str().to_string(),
            self.tagged.map(|t| t.to_string()).unwrap_or_default(),
            optional(&self.effort_basis),
            optional(&self.text_snippet),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub scanned: usize,
    pub not_scanned: usize,
    pub unclassified: usize,
    pub degraded: usize,
    pub estimated_hours: f64,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// True when some files were never analyzed
    pub partial: bool,
    pub summary: ReportSummary,
    pub records: Vec<ReportRecord>,
}

impl Report {
    /// Scanned files per portfolio destination ("bucket"). Files without a
    /// destination count under `Unclassified`.
    pub fn destination_totals(&self) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.status == ScanStatus::Scanned) {
            let bucket = record
                .destination
                .clone()
                .unwrap_or_else(|| UNCLASSIFIED.to_string());
            *totals.entry(bucket).or_insert(0) += 1;
        }
        totals
    }

    /// Record per-file tagging outcomes. Unknown indexes are ignored.
    pub fn merge_tag_results(&mut self, results: impl IntoIterator<Item = (usize, bool)>) {
        for (index, tagged) in results {
            if let Some(record) = self.records.get_mut(index) {
                record.tagged = Some(tagged);
            }
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CSV_HEADERS)?;
        for record in &self.records {
            writer.write_record(record.csv_row())?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let mut file = fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    include_text_snippets: bool,
}

impl ReportAssembler {
    pub fn new(include_text_snippets: bool) -> Self {
        Self { include_text_snippets }
    }

    /// `outcomes` is addressed by inventory index; `None` means not scanned.
    pub fn assemble(&self, inventory: &Inventory, outcomes: Vec<Option<FileOutcome>>) -> Result<Report> {
        if outcomes.len() != inventory.len() {
            return Err(DossierError::InvalidState(format!(
                "{} outcomes for {} inventoried files",
                outcomes.len(),
                inventory.len()
            )));
        }

        let records: Vec<ReportRecord> = inventory
            .entries
            .iter()
            .zip(outcomes)
            .map(|(entry, outcome)| match outcome {
                Some(outcome) => self.scanned(outcome),
                None => not_scanned(&entry.record),
            })
            .collect();

        let mut summary = ReportSummary {
            total: records.len(),
            ..ReportSummary::default()
        };
        for record in &records {
            match record.status {
                ScanStatus::Scanned => summary.scanned += 1,
                ScanStatus::NotScanned => {
                    summary.not_scanned += 1;
                    continue;
                }
            }
            if record.is_unclassified() {
                summary.unclassified += 1;
            }
            if record.extraction_degraded {
                summary.degraded += 1;
            }
            summary.estimated_hours += record.estimated_hours.unwrap_or(0.0);
            *summary
                .by_category
                .entry(record.primary_category.clone())
                .or_insert(0) += 1;
        }
        summary.estimated_hours = (summary.estimated_hours * 100.0).round() / 100.0;

        Ok(Report {
            partial: summary.not_scanned > 0,
            summary,
            records,
        })
    }

    fn scanned(&self, outcome: FileOutcome) -> ReportRecord {
        let FileOutcome {
            record,
            classification,
            effort,
        } = outcome;
        let text_snippet = if self.include_text_snippets {
            record.text.as_deref().map(snippet).filter(|s| !s.is_empty())
        } else {
            None
        };

        ReportRecord {
            source: record.key.source_id.to_string(),
            path: record.display_path.clone(),
            primary_category: classification.primary.to_string(),
            all_categories: classification
                .all_matching_categories
                .iter()
                .map(|c| c.to_string())
                .collect(),
            score: classification.score().as_f64(),
            subcategory: classification.subcategory,
            destination: classification.destination,
            rationale: classification.rationale,
            estimated_hours: Some(effort.hours),
            extraction_degraded: record.extraction.is_degraded(),
            status: ScanStatus::Scanned,
            tagged: None,
            effort_basis: Some(effort.basis.summary()),
            text_snippet,
        }
    }
}

fn not_scanned(record: &FileRecord) -> ReportRecord {
    ReportRecord {
        source: record.key.source_id.to_string(),
        path: record.display_path.clone(),
        primary_category: UNCLASSIFIED.to_string(),
        all_categories: Vec::new(),
        subcategory: None,
        destination: None,
        score: 0.0,
        rationale: Vec::new(),
        estimated_hours: None,
        extraction_degraded: false,
        status: ScanStatus::NotScanned,
        tagged: None,
        effort_basis: None,
        text_snippet: None,
    }
}

/// First characters of the text with whitespace collapsed.
fn snippet(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => format!("{}…", &collapsed[..end]),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Category, Weight};
    use crate::effort::{EffortBasis, SizeTier};
    use crate::inventory::InventoryEntry;
    use crate::source::FileHandle;
    use crate::types::ExtractionStatus;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(path: &str) -> InventoryEntry {
        let handle = FileHandle {
            key: crate::types::FileKey::new(Arc::from("local"), path),
            locator: path.to_string(),
            display_path: path.to_string(),
            size: 10,
            modified: Utc::now(),
            extension: None,
            mime_type: None,
            metadata: BTreeMap::new(),
        };
        InventoryEntry {
            record: handle.stub(),
            handle,
            root: "/".to_string(),
        }
    }

    fn inventory(paths: &[&str]) -> Inventory {
        Inventory {
            entries: paths.iter().map(|p| entry(p)).collect(),
            ..Inventory::default()
        }
    }

    fn outcome(inv: &Inventory, index: usize, category: Option<(&str, &str)>, degraded: bool) -> FileOutcome {
        let mut record = inv.entries[index].record.clone();
        record.text = Some("Concert   program\nnotes".to_string());
        record.extraction = if degraded {
            ExtractionStatus::degraded("no text extractor for .musx")
        } else {
            ExtractionStatus::Extracted
        };
        let classification = match category {
            Some((name, destination)) => {
                let weight = Weight::from_f64(2.0).unwrap();
                ClassificationResult {
                    scores: [(Category::new(name), weight)].into_iter().collect(),
                    primary: Category::new(name),
                    all_matching_categories: vec![Category::new(name)],
                    subcategory: Some("Sub".to_string()),
                    destination: Some(destination.to_string()),
                    rationale: vec!["rule: fired".to_string()],
                }
            }
            None => ClassificationResult::unclassified(),
        };
        FileOutcome {
            record,
            classification,
            effort: EffortEstimate {
                hours: 1.5,
                basis: EffortBasis::Heuristic {
                    size_tier: SizeTier::Tiny,
                    category_weight: 1.5,
                    revisions: 0,
                },
            },
        }
    }

    #[test]
    fn test_every_file_gets_one_record_in_order() {
        let inv = inventory(&["/a.pdf", "/b.musx", "/c.pdf"]);
        let outcomes = vec![
            Some(outcome(&inv, 0, Some(("Teaching", "Teaching Evidence")), false)),
            Some(outcome(&inv, 1, None, true)),
            None,
        ];
        let report = ReportAssembler::new(false).assemble(&inv, outcomes).unwrap();

        let paths: Vec<&str> = report.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.pdf", "/b.musx", "/c.pdf"]);
        assert!(report.partial);
        assert_eq!(report.summary.scanned, 2);
        assert_eq!(report.summary.not_scanned, 1);
        assert_eq!(report.summary.unclassified, 1);
        assert_eq!(report.summary.degraded, 1);
        assert_eq!(report.summary.estimated_hours, 3.0);

        let unclassified = &report.records[1];
        assert!(unclassified.is_unclassified());
        assert_eq!(unclassified.status, ScanStatus::Scanned);
        assert!(unclassified.extraction_degraded);
        assert!(unclassified.rationale.is_empty());

        let skipped = &report.records[2];
        assert!(skipped.is_unclassified());
        assert_eq!(skipped.status, ScanStatus::NotScanned);
        assert_eq!(skipped.estimated_hours, None);
    }

    #[test]
    fn test_outcome_count_mismatch_is_error() {
        let inv = inventory(&["/a.pdf"]);
        let result = ReportAssembler::new(false).assemble(&inv, vec![]);
        assert!(matches!(result, Err(DossierError::InvalidState(_))));
    }

    #[test]
    fn test_destination_totals_and_tags() {
        let inv = inventory(&["/a.pdf", "/b.pdf", "/c.pdf", "/d.pdf"]);
        let outcomes = vec![
            Some(outcome(&inv, 0, Some(("Teaching", "Teaching Evidence")), false)),
            Some(outcome(&inv, 1, Some(("Teaching", "Teaching Evidence")), false)),
            Some(outcome(&inv, 2, None, false)),
            None,
        ];
        let mut report = ReportAssembler::new(false).assemble(&inv, outcomes).unwrap();
        let totals = report.destination_totals();
        assert_eq!(totals.get("Teaching Evidence"), Some(&2));
        assert_eq!(totals.get(UNCLASSIFIED), Some(&1));
        assert_eq!(totals.values().sum::<usize>(), 3);

        report.merge_tag_results(vec![(0, true), (1, false), (99, true)]);
        assert_eq!(report.records[0].tagged, Some(true));
        assert_eq!(report.records[1].tagged, Some(false));
        assert_eq!(report.records[2].tagged, None);
    }

    #[test]
    fn test_snippets_only_when_enabled() {
        let inv = inventory(&["/a.pdf"]);
        let with = ReportAssembler::new(true)
            .assemble(&inv, vec![Some(outcome(&inv, 0, None, false))])
            .unwrap();
        assert_eq!(with.records[0].text_snippet.as_deref(), Some("Concert program notes"));

        let without = ReportAssembler::new(false)
            .assemble(&inv, vec![Some(outcome(&inv, 0, None, false))])
            .unwrap();
        assert_eq!(without.records[0].text_snippet, None);
    }

    #[test]
    fn test_write_csv_and_json() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&["/a.pdf"]);
        let report = ReportAssembler::new(false)
            .assemble(&inv, vec![Some(outcome(&inv, 0, Some(("Service", "Appendices")), false))])
            .unwrap();

        let csv_path = dir.path().join("out").join("report.csv");
        report.write_csv(&csv_path).unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, CSV_HEADERS);
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[2], "Service");
        assert_eq!(&row[5], "Appendices");
        assert_eq!(&row[10], "scanned");

        let json_path = dir.path().join("report.json");
        report.write_json(&json_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["records"][0]["primary_category"], "Service");
        assert_eq!(value["partial"], false);
        assert!(value["records"][0].get("text_snippet").is_none());
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "word ".repeat(200);
        let s = snippet(&long);
        assert!(s.ends_with('…'));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 1);
    }
}
