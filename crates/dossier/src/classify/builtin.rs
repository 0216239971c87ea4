//! Built-in academic portfolio rule matrix.
//!
//! Used when no rule file is configured. Every rule is a token-prefix
//! keyword match over the file stem, extension, metadata and text; form
//! rules weigh more so a cover sheet that mentions "evaluation" is still a
//! form first.

use super::rules::{ConditionSpec, RuleSpec};
use super::{ADVISING, FORM, SCHOLARLY, SERVICE, TEACHING};

const TEACHING_EVIDENCE: &str = "Primary PDF → Teaching Evidence";
const SERVICE_EVIDENCE: &str = "Primary PDF → Service Evidence";
const SCHOLARSHIP_EVIDENCE: &str = "Primary PDF → Scholarship Evidence";

struct Entry {
    id: &'static str,
    keywords: &'static [&'static str],
    category: &'static str,
    subcategory: &'static str,
    destination: &'static str,
    weight: f64,
    description: &'static str,
}

const MATRIX: &[Entry] = &[
    Entry {
        id: "teaching-ensemble",
        keywords: &["concert program", "ensemble"],
        category: TEACHING,
        subcategory: "Ensemble Leadership",
        destination: TEACHING_EVIDENCE,
        weight: 2.0,
        description: "Ensemble programs demonstrate instructional leadership.",
    },
    Entry {
        id: "teaching-assessment",
        keywords: &["student assessment", "quiz", "evaluation"],
        category: TEACHING,
        subcategory: "Course Assessment",
        destination: TEACHING_EVIDENCE,
        weight: 2.0,
        description: "Student feedback shows teaching effectiveness.",
    },
    Entry {
        id: "teaching-pedagogy",
        keywords: &["repertoire feedback", "pedagogy"],
        category: TEACHING,
        subcategory: "Course Material",
        destination: TEACHING_EVIDENCE,
        weight: 2.0,
        description: "Pedagogical material documents learning outcomes.",
    },
    Entry {
        id: "service-roster",
        keywords: &["member info", "roster"],
        category: SERVICE,
        subcategory: "Recruiting (admin evidence)",
        destination: SERVICE_EVIDENCE,
        weight: 2.0,
        description: "Recruitment management is classified as service.",
    },
    Entry {
        id: "service-recruiting",
        keywords: &["recruiting email", "prospect"],
        category: SERVICE,
        subcategory: "Recruiting (outreach)",
        destination: SERVICE_EVIDENCE,
        weight: 2.0,
        description: "Outreach recruiting is a service activity.",
    },
    Entry {
        id: "service-logistics",
        keywords: &["vendor order", "invoice", "receipt"],
        category: SERVICE,
        subcategory: "Logistics / Ops",
        destination: "Appendices",
        weight: 1.0,
        description: "Operational logistics go to appendices.",
    },
    Entry {
        id: "teaching-mentorship",
        keywords: &["leadership application", "mentorship"],
        category: TEACHING,
        subcategory: "Mentorship / Leadership Dev.",
        destination: TEACHING_EVIDENCE,
        weight: 2.0,
        description: "Leadership development counts as teaching.",
    },
    Entry {
        id: "scholarly-design-files",
        keywords: &["drill design", "musx", "sib"],
        category: SCHOLARLY,
        subcategory: "Creative Output",
        destination: SCHOLARSHIP_EVIDENCE,
        weight: 3.0,
        description: "Design files are creative scholarship.",
    },
    Entry {
        id: "scholarly-composition",
        keywords: &["composition", "arrangement"],
        category: SCHOLARLY,
        subcategory: "Creative Output",
        destination: SCHOLARSHIP_EVIDENCE,
        weight: 3.0,
        description: "Compositions qualify as scholarship.",
    },
    Entry {
        id: "scholarly-literature",
        keywords: &["literature review", "bib"],
        category: SCHOLARLY,
        subcategory: "Research Prep",
        destination: SCHOLARSHIP_EVIDENCE,
        weight: 2.0,
        description: "Lit reviews prepare scholarship.",
    },
    Entry {
        id: "scholarly-recording",
        keywords: &["recording", "publicity"],
        category: SCHOLARLY,
        subcategory: "Creative Output",
        destination: SCHOLARSHIP_EVIDENCE,
        weight: 2.0,
        description: "Recordings promote creative work.",
    },
    Entry {
        id: "service-visibility",
        keywords: &["community performance", "pep band", "game"],
        category: SERVICE,
        subcategory: "University Visibility",
        destination: SERVICE_EVIDENCE,
        weight: 2.0,
        description: "Campus performances expand visibility.",
    },
    Entry {
        id: "service-clinic",
        keywords: &["clinic", "adjudicat"],
        category: SERVICE,
        subcategory: "Professional Engagement",
        destination: SERVICE_EVIDENCE,
        weight: 2.0,
        description: "Clinics and adjudication are service.",
    },
    Entry {
        id: "advising-load",
        keywords: &["advising load", "advisee"],
        category: ADVISING,
        subcategory: "Formal Advising",
        destination: "Primary PDF → Advising Summary",
        weight: 2.0,
        description: "Advising reports document workload.",
    },
    Entry {
        id: "advising-artifacts",
        keywords: &["orientation", "grad plan"],
        category: ADVISING,
        subcategory: "Advising Artifacts",
        destination: "Primary PDF → Advising Evidence",
        weight: 2.0,
        description: "Advising materials support advising.",
    },
    Entry {
        id: "form-annual-evaluation",
        keywords: &["annual evaluation"],
        category: FORM,
        subcategory: "Annual Eval",
        destination: "SummaryTable (in Primary PDF)",
        weight: 4.0,
        description: "Annual evaluations are required forms.",
    },
    Entry {
        id: "form-cover-sheet",
        keywords: &["notice of intent", "cover sheet"],
        category: FORM,
        subcategory: "Cover Sheet",
        destination: "Form (separate PDF)",
        weight: 4.0,
        description: "Cover sheets belong in the form section.",
    },
];

/// The built-in matrix as rule entries, ready for [`super::RuleTable::from_specs`].
///
/// Each entry becomes one `keyword_prefix` condition, so any one of its
/// keywords classifies a file.
pub fn default_rules() -> Vec<RuleSpec> {
    MATRIX
        .iter()
        .map(|entry| RuleSpec {
            id: entry.id.to_string(),
            description: Some(entry.description.to_string()),
            category: entry.category.to_string(),
            subcategory: Some(entry.subcategory.to_string()),
            destination: Some(entry.destination.to_string()),
            weight: entry.weight,
            conditions: vec![ConditionSpec::KeywordPrefix {
                values: entry.keywords.iter().map(|k| k.to_string()).collect(),
            }],
        })
        .collect()
}
