//! Data-quality reporting. Importers never fail on dirty data; they describe what they
//! skipped or doubted to a [`DataQualitySink`] handed to them at construction.

use chrono::NaiveDate;
use std::cell::RefCell;

use super::validation::InvalidIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataQualityIssue {
    #[error("no tracked applicant matches {feed} record for {subject}")]
    IdentityNotFound { feed: &'static str, subject: String },
    #[error("{applicant} already has a result for unit {unit_code}; new record skipped")]
    DuplicateResult {
        applicant: String,
        unit_code: String,
    },
    #[error("several applicants match {subject}; using {chosen}")]
    AmbiguousMatch { subject: String, chosen: String },
    #[error("matched {applicant} by name only; date of birth and postcode disagree")]
    NameOnlyMatch { applicant: String },
    #[error("{applicant}: {source}")]
    InvalidIdentifier {
        applicant: String,
        source: InvalidIdentifier,
    },
    #[error("exam number {exam_number} is shared by {}", .applicants.join(", "))]
    DuplicateExamNumber {
        exam_number: String,
        applicants: Vec<String>,
    },
    #[error("interview for {applicant} at {institution} kept at {kept} (still invited on {seen})")]
    InterviewDateRetained {
        applicant: String,
        institution: String,
        kept: NaiveDate,
        seen: NaiveDate,
    },
    #[error("{applicant} appears in historic data but not in current data")]
    HistoricOnlyApplicant { applicant: String },
    #[error("unexpected line ignored: {line}")]
    UnrecognizedLine { line: String },
    #[error("result for unit {unit_code} is not in basedata")]
    UnknownSubject { unit_code: String },
    #[error("non A level result ignored: {level} {subject}")]
    NonAlevelResult { level: String, subject: String },
    #[error("{applicant} has a firm choice but no insurance")]
    MissingInsurance { applicant: String },
    #[error("{applicant} holds an insurance offer at least as demanding as their firm")]
    AcceptanceAnomaly { applicant: String },
    #[error("ignored prediction '{grade}' in {subject} for {applicant}")]
    IgnoredPrediction {
        applicant: String,
        subject: String,
        grade: String,
    },
    #[error("choice for {applicant} ignored: {reason}")]
    InvalidChoice { applicant: String, reason: String },
}

/// Receives data-quality issues raised while importing and reporting.
pub trait DataQualitySink {
    fn report(&self, issue: DataQualityIssue);
}

/// Production sink: every issue becomes a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DataQualitySink for TracingSink {
    fn report(&self, issue: DataQualityIssue) {
        match &issue {
            DataQualityIssue::UnrecognizedLine { .. }
            | DataQualityIssue::NonAlevelResult { .. }
            | DataQualityIssue::InterviewDateRetained { .. } => {
                tracing::debug!(issue = %issue, "data quality")
            }
            _ => tracing::warn!(issue = %issue, "data quality"),
        }
    }
}

/// Keeps issues in memory; used by tests and callers that summarize a run.
#[derive(Debug, Default)]
pub struct CollectingSink {
    issues: RefCell<Vec<DataQualityIssue>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> Vec<DataQualityIssue> {
        self.issues.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&DataQualityIssue) -> bool) -> usize {
        self.issues.borrow().iter().filter(|issue| matches(issue)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.borrow().is_empty()
    }
}

impl DataQualitySink for CollectingSink {
    fn report(&self, issue: DataQualityIssue) {
        self.issues.borrow_mut().push(issue);
    }
}
