use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::super::domain::{Applicant, Choice};
use super::super::offer::{rank_points, Offer, SPECIAL_CONDITIONS_VALUE};
use super::super::store::ApplicantStore;
use super::destinations::offer_grades;

/// Predictions beyond this many grades only count when an offer asks for more.
const COUNTED_PREDICTIONS: usize = 3;
const ONE_GRADE: u32 = rank_points(1) - rank_points(0);

/// What applicants' offers are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBasis {
    Predictions,
    Results,
}

impl RiskBasis {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Predictions => "Predictions",
            Self::Results => "Results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    HighSpecialConditions,
    Medium,
    MediumSpecialConditions,
    Low,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::HighSpecialConditions => "HIGH (special conditions)",
            Self::Medium => "MEDIUM",
            Self::MediumSpecialConditions => "MEDIUM (special conditions)",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeldChoiceView {
    pub institution: String,
    pub course: String,
    /// Offer grades, or `U` for an unconditional offer.
    pub grades: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskEntry {
    pub applicant: String,
    pub firm: Option<HeldChoiceView>,
    pub insurance: Option<HeldChoiceView>,
    /// Predicted or achieved grades, per the report basis.
    pub grades: String,
    pub risk: RiskLevel,
    pub risk_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskReport {
    pub date: NaiveDate,
    pub basis: RiskBasis,
    pub basis_label: &'static str,
    pub entries: Vec<AtRiskEntry>,
}

/// Applicants whose held offers look out of reach at the current snapshot.
///
/// Offers are valued against predictions until any results are held, then against
/// results. Applicants not at risk are left out.
pub fn at_risk(store: &ApplicantStore) -> Option<AtRiskReport> {
    let date = store.current_date()?;
    let basis = if store
        .applicants()
        .iter()
        .any(|applicant| !applicant.results().is_empty())
    {
        RiskBasis::Results
    } else {
        RiskBasis::Predictions
    };
    info!(basis = basis.label(), "assessing offers at risk");

    let entries = store
        .applicants()
        .iter()
        .filter_map(|applicant| at_risk_entry(applicant, date, basis))
        .collect();

    Some(AtRiskReport {
        date,
        basis,
        basis_label: basis.label(),
        entries,
    })
}

fn at_risk_entry(applicant: &Applicant, date: NaiveDate, basis: RiskBasis) -> Option<AtRiskEntry> {
    let firm = applicant.firm(date);
    let insurance = applicant.insurance(date);

    let attained = match basis {
        RiskBasis::Results => applicant.results_as_offer(),
        RiskBasis::Predictions => {
            let counted = [firm, insurance]
                .into_iter()
                .flatten()
                .map(|choice| choice.offer().num_grades())
                .fold(COUNTED_PREDICTIONS, usize::max);
            best_predictions(applicant, counted)
        }
    };

    let risk = assess(firm, insurance, &attained, basis)?;
    Some(AtRiskEntry {
        applicant: applicant.display_name().to_string(),
        firm: firm.map(held_view),
        insurance: insurance.map(held_view),
        grades: attained.grade_equivalent(),
        risk,
        risk_label: risk.label(),
    })
}

/// The `count` best predicted grades.
fn best_predictions(applicant: &Applicant, count: usize) -> Offer {
    let best: String = applicant
        .predictions_as_offer()
        .key()
        .chars()
        .take(count)
        .collect();
    Offer::normalize(&best.replace('@', "A*"))
}

fn assess(
    firm: Option<&Choice>,
    insurance: Option<&Choice>,
    attained: &Offer,
    basis: RiskBasis,
) -> Option<RiskLevel> {
    let using_results = basis == RiskBasis::Results;
    let value = |choice: Option<&Choice>| choice.map_or(0, |choice| choice.offer().grade_value());
    let firm_value = value(firm);
    let insurance_value = value(insurance);
    let attained_value = attained.grade_value();

    let mut risk = firm.is_none().then_some(RiskLevel::High);

    if firm_value > attained_value {
        risk = Some(if firm_value == SPECIAL_CONDITIONS_VALUE {
            RiskLevel::HighSpecialConditions
        } else {
            RiskLevel::High
        });
        if let Some(insurance) = insurance {
            if insurance_value == attained_value {
                risk = if !using_results {
                    Some(RiskLevel::Medium)
                } else if insurance.offer().grades() != attained.grade_equivalent() {
                    Some(RiskLevel::Low)
                } else {
                    None
                };
            } else if insurance_value < attained_value {
                risk = (!using_results).then_some(RiskLevel::Low);
            }
        }
    }

    if firm_value > 0 && firm_value == attained_value && !using_results {
        if insurance.is_none() || insurance_value >= attained_value {
            risk = Some(if insurance_value == SPECIAL_CONDITIONS_VALUE {
                RiskLevel::MediumSpecialConditions
            } else {
                RiskLevel::Medium
            });
        } else if insurance_value + ONE_GRADE == attained_value {
            risk = Some(RiskLevel::Low);
        }
    }

    risk
}

fn held_view(choice: &Choice) -> HeldChoiceView {
    HeldChoiceView {
        institution: choice.institution().to_string(),
        course: choice.course().to_string(),
        grades: offer_grades(choice),
    }
}
