use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::super::comparator::{compare, GradeComparison};
use super::super::domain::{Applicant, Choice, Outcome};
use super::super::store::ApplicantStore;

/// Where an applicant's results leave them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    NoOffers,
    Firm,
    Insurance,
    Unmet,
    Check,
}

impl Destination {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Firm,
            Self::Insurance,
            Self::Unmet,
            Self::Check,
            Self::NoOffers,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NoOffers => "No offers",
            Self::Firm => "Firm",
            Self::Insurance => "Insurance",
            Self::Unmet => "Unmet",
            Self::Check => "CHECK",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedChoiceView {
    pub institution: String,
    pub course: String,
    /// Offer grades, or `U` for an unconditional offer.
    pub grades: String,
    pub comparison: GradeComparison,
    pub comparison_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DestinationEntry {
    pub applicant: String,
    pub cycle_service_id: String,
    pub cycle: String,
    pub current_cohort: Option<bool>,
    pub upn: Option<String>,
    pub exam_number: Option<String>,
    pub firm: Option<AcceptedChoiceView>,
    pub insurance: Option<AcceptedChoiceView>,
    pub achieved: String,
    pub predicted: String,
    pub achieved_vs_predicted: GradeComparison,
    pub achieved_vs_predicted_label: &'static str,
    pub destination: Destination,
    pub destination_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DestinationTotal {
    pub destination: Destination,
    pub destination_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DestinationsReport {
    pub date: NaiveDate,
    pub entries: Vec<DestinationEntry>,
    pub totals: Vec<DestinationTotal>,
}

/// Compares achieved grades against firm and insurance offers for every applicant at the
/// current snapshot. `None` when no snapshot has been absorbed.
pub fn destinations(store: &ApplicantStore) -> Option<DestinationsReport> {
    let date = store.current_date()?;
    let entries: Vec<DestinationEntry> = store
        .applicants()
        .iter()
        .map(|applicant| destination_entry(applicant, date))
        .collect();

    let totals = Destination::ordered()
        .into_iter()
        .map(|destination| DestinationTotal {
            destination,
            destination_label: destination.label(),
            count: entries
                .iter()
                .filter(|entry| entry.destination == destination)
                .count(),
        })
        .collect();

    Some(DestinationsReport {
        date,
        entries,
        totals,
    })
}

fn destination_entry(applicant: &Applicant, date: NaiveDate) -> DestinationEntry {
    let achieved = applicant.results_as_offer();
    let predicted = applicant.predictions_as_offer();
    let firm = applicant.firm(date);
    let insurance = applicant.insurance(date);

    match (firm, insurance) {
        (None, _) => debug!(applicant = %applicant.display_name(), "no firm choice"),
        (Some(firm), None) if firm.outcome() != Outcome::Unconditional => {
            debug!(applicant = %applicant.display_name(), "conditional firm without insurance")
        }
        _ => {}
    }

    let versus = |choice: Option<&Choice>| {
        choice.map_or(GradeComparison::NoOffer, |choice| {
            compare(&achieved, choice.offer(), true)
        })
    };
    let firm_result = versus(firm);
    let insurance_result = versus(insurance);

    let destination = if firm.is_none() {
        Destination::NoOffers
    } else if firm_result.is_met() {
        Destination::Firm
    } else if insurance_result.is_met() {
        Destination::Insurance
    } else if firm_result.is_unmet() && insurance_result.is_unmet() {
        Destination::Unmet
    } else {
        Destination::Check
    };

    let achieved_vs_predicted = compare(&achieved, &predicted, false);
    let ids = applicant.ids();

    DestinationEntry {
        applicant: applicant.display_name().to_string(),
        cycle_service_id: applicant.cycle_service_id().to_string(),
        cycle: applicant.cycle().to_string(),
        current_cohort: applicant.current_cohort(),
        upn: ids.upn.clone(),
        exam_number: ids.exam_number.clone(),
        firm: firm.map(|choice| accepted_view(choice, firm_result)),
        insurance: insurance.map(|choice| accepted_view(choice, insurance_result)),
        achieved: achieved.grades(),
        predicted: predicted.grades(),
        achieved_vs_predicted,
        achieved_vs_predicted_label: achieved_vs_predicted.label(),
        destination,
        destination_label: destination.label(),
    }
}

fn accepted_view(choice: &Choice, comparison: GradeComparison) -> AcceptedChoiceView {
    AcceptedChoiceView {
        institution: choice.institution().to_string(),
        course: choice.course().to_string(),
        grades: offer_grades(choice),
        comparison,
        comparison_label: comparison.label(),
    }
}

pub(super) fn offer_grades(choice: &Choice) -> String {
    match choice.outcome() {
        Outcome::Unconditional => "U".to_string(),
        _ => choice.offer().grades(),
    }
}
