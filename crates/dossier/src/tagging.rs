//! Post-run tagging
//!
//! Tags are applied to local files only, after classification. The engine
//! builds the plan; an external collaborator (a [`TagSink`]) applies it
//! and reports per-file success, which is merged back into the report.

use crate::classify::{category_colors, Category};
use crate::error::Result;
use crate::report::{Report, ScanStatus};
use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Finder-style label colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    Green,
    Blue,
    Yellow,
    Purple,
    Orange,
}

impl TagColor {
    pub fn as_str(self) -> &'static str {
        match self {
            TagColor::Green => "green",
            TagColor::Blue => "blue",
            TagColor::Yellow => "yellow",
            TagColor::Purple => "purple",
            TagColor::Orange => "orange",
        }
    }
}

/// One file to tag. `index` addresses the report record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRequest {
    pub index: usize,
    pub path: String,
    pub category: Category,
    pub destination: Option<String>,
    pub color: Option<TagColor>,
    /// Primary category, then destination when present
    pub tags: Vec<String>,
}

/// Applies tags to files. Returns whether the file was tagged.
///
/// Called exactly once per request; failures are not retried.
pub trait TagSink {
    fn apply(&self, request: &TagRequest) -> bool;
}

/// Tag requests for every scanned, classified record on a local source.
///
/// `kind_of` resolves a record's source id; unknown sources are skipped.
pub fn tag_plan(report: &Report, kind_of: impl Fn(&str) -> Option<SourceKind>) -> Vec<TagRequest> {
    let colors = category_colors();
    report
        .records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.status == ScanStatus::Scanned && !record.is_unclassified())
        .filter(|(_, record)| kind_of(&record.source) == Some(SourceKind::Local))
        .map(|(index, record)| {
            let category = Category::new(record.primary_category.clone());
            let mut tags = vec![record.primary_category.clone()];
            tags.extend(record.destination.clone());
            TagRequest {
                index,
                path: record.path.clone(),
                color: colors.get(&category).copied(),
                category,
                destination: record.destination.clone(),
                tags,
            }
        })
        .collect()
}

/// Run `plan` through `sink` and merge the outcomes into `report`.
/// Returns the number of files tagged.
pub fn apply_tags(report: &mut Report, plan: &[TagRequest], sink: &dyn TagSink) -> usize {
    let mut outcomes = Vec::with_capacity(plan.len());
    for request in plan {
        let tagged = sink.apply(request);
        if tagged {
            debug!(path = %request.path, tags = ?request.tags, "Tagged");
        } else {
            warn!(path = %request.path, "Tagging failed");
        }
        outcomes.push((request.index, tagged));
    }
    let tagged = outcomes.iter().filter(|(_, ok)| *ok).count();
    report.merge_tag_results(outcomes);
    tagged
}

/// Write the plan as JSON for an external tagging tool.
pub fn write_plan(plan: &[TagRequest], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(plan)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{SCHOLARLY, TEACHING};
    use crate::report::{ReportRecord, ReportSummary};
    use std::cell::RefCell;

    fn record(source: &str, path: &str, category: &str, status: ScanStatus) -> ReportRecord {
        ReportRecord {
            source: source.to_string(),
            path: path.to_string(),
            primary_category: category.to_string(),
            all_categories: vec![category.to_string()],
            subcategory: None,
            destination: Some("Teaching Evidence".to_string()),
            score: 2.0,
            rationale: vec![],
            estimated_hours: Some(1.0),
            extraction_degraded: false,
            status,
            tagged: None,
            effort_basis: None,
            text_snippet: None,
        }
    }

    fn report() -> Report {
        Report {
            partial: true,
            summary: ReportSummary::default(),
            records: vec![
                record("local", "/a.pdf", TEACHING, ScanStatus::Scanned),
                record("drive:work", "drive:work/b.pdf", TEACHING, ScanStatus::Scanned),
                record("local", "/c.pdf", "Unclassified", ScanStatus::Scanned),
                record("local", "/d.pdf", TEACHING, ScanStatus::NotScanned),
                record("local", "/e.musx", SCHOLARLY, ScanStatus::Scanned),
            ],
        }
    }

    fn kinds(source: &str) -> Option<SourceKind> {
        match source {
            "local" => Some(SourceKind::Local),
            "drive:work" => Some(SourceKind::Remote),
            _ => None,
        }
    }

    struct Recording {
        calls: RefCell<Vec<String>>,
        fail: &'static str,
    }

    impl TagSink for Recording {
        fn apply(&self, request: &TagRequest) -> bool {
            self.calls.borrow_mut().push(request.path.clone());
            request.path != self.fail
        }
    }

    #[test]
    fn test_plan_covers_local_classified_scanned_only() {
        let plan = tag_plan(&report(), kinds);
        let paths: Vec<&str> = plan.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.pdf", "/e.musx"]);
        assert_eq!(plan[0].index, 0);
        assert_eq!(plan[0].color, Some(TagColor::Green));
        assert_eq!(plan[0].tags, vec![TEACHING.to_string(), "Teaching Evidence".to_string()]);
        assert_eq!(plan[1].index, 4);
        assert_eq!(plan[1].color, Some(TagColor::Blue));
    }

    #[test]
    fn test_apply_tags_calls_sink_once_and_merges() {
        let mut report = report();
        let plan = tag_plan(&report, kinds);
        let sink = Recording {
            calls: RefCell::new(Vec::new()),
            fail: "/e.musx",
        };

        let tagged = apply_tags(&mut report, &plan, &sink);
        assert_eq!(tagged, 1);
        assert_eq!(sink.calls.borrow().len(), 2);
        assert_eq!(report.records[0].tagged, Some(true));
        assert_eq!(report.records[4].tagged, Some(false));
        assert_eq!(report.records[1].tagged, None);
    }

    #[test]
    fn test_write_plan() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tags.json");
        write_plan(&tag_plan(&report(), kinds), &path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["color"], "green");
        assert_eq!(value[0]["category"], TEACHING);
    }
}
