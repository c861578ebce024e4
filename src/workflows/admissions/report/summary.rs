use chrono::NaiveDate;
use serde::Serialize;

use super::super::domain::{Applicant, ChoiceCounts, Outcome};
use super::super::quality::{DataQualityIssue, DataQualitySink};
use super::super::store::ApplicantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantStatus {
    ChoicesMade,
    InClearing,
    DeclinedAll,
    ReadyToChoose,
    AwaitingDecisions,
}

impl ApplicantStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChoicesMade => "Choices made",
            Self::InClearing => "In clearing",
            Self::DeclinedAll => "Declined all",
            Self::ReadyToChoose => "Ready to choose",
            Self::AwaitingDecisions => "Awaiting decisions",
        }
    }

    fn classify(counts: &ChoiceCounts, has_firm: bool) -> Self {
        if has_firm {
            Self::ChoicesMade
        } else if counts.decisions() < counts.total {
            Self::AwaitingDecisions
        } else if counts.offers() == 0 {
            Self::InClearing
        } else if counts.open_offers() == 0 {
            Self::DeclinedAll
        } else {
            Self::ReadyToChoose
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicantSummaryEntry {
    pub applicant: String,
    pub cycle_service_id: String,
    pub newly_seen: bool,
    pub counts: ChoiceCounts,
    pub open_offers: usize,
    pub updated_choices: usize,
    pub firm_institution: Option<String>,
    pub insurance_institution: Option<String>,
    pub status: ApplicantStatus,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub date: NaiveDate,
    pub applicants: usize,
    pub choices_made: usize,
    pub awaiting_decisions: usize,
    pub entries: Vec<ApplicantSummaryEntry>,
}

/// Per-applicant choice counts and decision status at the current snapshot. Conditional
/// firm acceptances without an insurance choice and insurance offers valued at or above
/// the firm are reported to `sink`.
pub fn applicant_summary(store: &ApplicantStore, sink: &dyn DataQualitySink) -> Option<SummaryReport> {
    let date = store.current_date()?;
    let entries: Vec<ApplicantSummaryEntry> = store
        .applicants()
        .iter()
        .filter(|applicant| !applicant.choices(date).is_empty())
        .map(|applicant| summary_entry(applicant, date, sink))
        .collect();

    let with_status = |status: ApplicantStatus| {
        entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    };

    Some(SummaryReport {
        date,
        applicants: entries.len(),
        choices_made: with_status(ApplicantStatus::ChoicesMade),
        awaiting_decisions: with_status(ApplicantStatus::AwaitingDecisions),
        entries,
    })
}

fn summary_entry(applicant: &Applicant, date: NaiveDate, sink: &dyn DataQualitySink) -> ApplicantSummaryEntry {
    let counts = applicant.choice_counts(date);
    let firm = applicant.firm(date);
    let insurance = applicant.insurance(date);

    if let (Some(firm), None) = (firm, insurance) {
        if firm.outcome() != Outcome::Unconditional {
            sink.report(DataQualityIssue::MissingInsurance {
                applicant: applicant.display_name().to_string(),
            });
        }
    }
    if applicant.acceptance_anomaly(date) {
        sink.report(DataQualityIssue::AcceptanceAnomaly {
            applicant: applicant.display_name().to_string(),
        });
    }

    let status = ApplicantStatus::classify(&counts, firm.is_some());
    ApplicantSummaryEntry {
        applicant: applicant.display_name().to_string(),
        cycle_service_id: applicant.cycle_service_id().to_string(),
        newly_seen: applicant.is_newly_seen(),
        counts,
        open_offers: counts.open_offers(),
        updated_choices: applicant
            .choices(date)
            .iter()
            .filter(|choice| choice.update().has_updated())
            .count(),
        firm_institution: firm.map(|choice| choice.institution().to_string()),
        insurance_institution: insurance.map(|choice| choice.institution().to_string()),
        status,
        status_label: status.label(),
    }
}
