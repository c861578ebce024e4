use chrono::NaiveDate;
use serde::Serialize;

use super::super::domain::{Applicant, Choice, ChoiceUpdate, Outcome};
use super::super::store::ApplicantStore;

pub const NEW_APPLICANT_LABEL: &str = "NEW APPLICANT";

/// Which choices the offers report lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffersScope {
    /// Every choice carrying offer grades.
    AllOffers,
    /// Every choice that changed since the previous snapshot.
    Updates,
}

impl OffersScope {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllOffers => "All offers",
            Self::Updates => "Updates since last snapshot",
        }
    }

    fn includes(self, choice: &Choice) -> bool {
        match self {
            Self::AllOffers => choice.is_offer(),
            Self::Updates => choice.update().has_updated(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferRow {
    pub applicant: String,
    pub new_applicant: bool,
    /// Earliest snapshot holding a choice for a new applicant.
    pub first_seen: Option<NaiveDate>,
    pub institution: String,
    pub course_code: String,
    pub course: String,
    pub outcome: Option<Outcome>,
    pub outcome_label: &'static str,
    pub offer_grades: String,
    pub update: Option<ChoiceUpdate>,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffersReport {
    pub date: NaiveDate,
    pub previous_date: Option<NaiveDate>,
    pub scope: OffersScope,
    pub scope_label: &'static str,
    pub rows: Vec<OfferRow>,
}

/// Offers, or changes since the previous snapshot, at the current snapshot. Applicants
/// first seen in the latest snapshot get a single marker row instead of their choices.
pub fn offers(store: &ApplicantStore, scope: OffersScope) -> Option<OffersReport> {
    let date = store.current_date()?;
    let rows = store
        .applicants()
        .iter()
        .flat_map(|applicant| applicant_rows(applicant, date, scope))
        .collect();

    Some(OffersReport {
        date,
        previous_date: store.previous_date(),
        scope,
        scope_label: scope.label(),
        rows,
    })
}

fn applicant_rows(applicant: &Applicant, date: NaiveDate, scope: OffersScope) -> Vec<OfferRow> {
    if applicant.is_newly_seen() {
        return vec![new_applicant_row(applicant)];
    }

    applicant
        .choices(date)
        .iter()
        .filter(|choice| scope.includes(choice))
        .map(|choice| {
            let update = (scope == OffersScope::Updates).then(|| choice.update());
            OfferRow {
                applicant: applicant.display_name().to_string(),
                new_applicant: false,
                first_seen: None,
                institution: choice.institution().to_string(),
                course_code: choice.course_code().to_string(),
                course: choice.course().to_string(),
                outcome: Some(choice.outcome()),
                outcome_label: choice.outcome().label(),
                offer_grades: choice.offer().grades(),
                update,
                status_label: update.map_or("", ChoiceUpdate::label),
            }
        })
        .collect()
}

fn new_applicant_row(applicant: &Applicant) -> OfferRow {
    OfferRow {
        applicant: applicant.display_name().to_string(),
        new_applicant: true,
        first_seen: applicant.snapshot_dates().next(),
        institution: String::new(),
        course_code: String::new(),
        course: String::new(),
        outcome: None,
        outcome_label: "",
        offer_grades: String::new(),
        update: None,
        status_label: NEW_APPLICANT_LABEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::domain::ChoiceId;
    use crate::workflows::feeds::status::StudentRecord;

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).expect("valid date")
    }

    fn record(surname: &str, service_id: &str) -> StudentRecord {
        StudentRecord {
            surname: surname.to_string(),
            forenames: "Sam".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2006, 5, 1).expect("valid date"),
            cycle_service_id: service_id.to_string(),
            cycle: "1".to_string(),
            postcode: "LS6 2AA".to_string(),
        }
    }

    fn choice(sequence: u32, outcome: &str, offer: &str, update: ChoiceUpdate) -> Choice {
        let mut choice = Choice::new(
            ChoiceId {
                sequence,
                institution_code: format!("U{sequence}"),
            },
            format!("University {sequence}"),
            format!("C10{sequence}"),
            "Chemistry",
            outcome,
            offer,
        )
        .expect("valid outcome");
        choice.set_update(update);
        choice
    }

    /// Adams was seen in both snapshots; Baker appears only in the latest one.
    fn two_snapshot_store() -> ApplicantStore {
        let mut store = ApplicantStore::new();
        store.add_date(day(1));
        store.add_date(day(8));

        let adams = record("Adams", "1000000001");
        store.add_student(&adams, false);
        let (index, _) = store.add_student(&adams, false);
        let applicant = store.applicant_mut(index).expect("tracked");
        applicant.add_choice(day(1), choice(1, "INV", "", ChoiceUpdate::Undetermined));
        applicant.add_choice(
            day(8),
            choice(
                1,
                "C",
                "BBA",
                ChoiceUpdate::Changed {
                    course: false,
                    outcome: true,
                },
            ),
        );
        applicant.add_choice(day(8), choice(2, "REJ", "", ChoiceUpdate::Unchanged));
        applicant.add_choice(day(8), choice(3, "INV", "", ChoiceUpdate::New));
        applicant.add_choice(day(8), choice(4, "C", "CCC", ChoiceUpdate::Unchanged));

        let (index, _) = store.add_student(&record("Baker", "1000000002"), false);
        store
            .applicant_mut(index)
            .expect("tracked")
            .add_choice(day(8), choice(1, "C", "AAA", ChoiceUpdate::New));
        store
    }

    #[test]
    fn all_offers_lists_choices_with_grades() {
        let report = offers(&two_snapshot_store(), OffersScope::AllOffers).expect("snapshot loaded");
        assert_eq!(report.date, day(8));
        assert_eq!(report.previous_date, Some(day(1)));

        let adams: Vec<&OfferRow> = report
            .rows
            .iter()
            .filter(|row| row.applicant == "ADAMS Sam")
            .collect();
        assert_eq!(adams.len(), 2);
        assert_eq!(adams[0].offer_grades, "ABB");
        assert_eq!(adams[0].outcome_label, "Conditional Offer");
        assert_eq!(adams[0].course_code, "C101");
        assert!(adams.iter().all(|row| row.update.is_none() && row.status_label.is_empty()));
    }

    #[test]
    fn updates_list_only_changed_choices() {
        let report = offers(&two_snapshot_store(), OffersScope::Updates).expect("snapshot loaded");
        let statuses: Vec<(&str, &str)> = report
            .rows
            .iter()
            .filter(|row| !row.new_applicant)
            .map(|row| (row.course_code.as_str(), row.status_label))
            .collect();
        assert_eq!(statuses, vec![("C101", "Outcome changed"), ("C103", "New")]);
    }

    #[test]
    fn new_applicants_get_a_marker_row_in_either_scope() {
        for scope in [OffersScope::AllOffers, OffersScope::Updates] {
            let report = offers(&two_snapshot_store(), scope).expect("snapshot loaded");
            let baker: Vec<&OfferRow> = report
                .rows
                .iter()
                .filter(|row| row.applicant == "BAKER Sam")
                .collect();
            assert_eq!(baker.len(), 1);
            assert!(baker[0].new_applicant);
            assert_eq!(baker[0].status_label, NEW_APPLICANT_LABEL);
            assert_eq!(baker[0].first_seen, Some(day(8)));
            assert!(baker[0].outcome.is_none());
        }
    }

    #[test]
    fn empty_store_has_no_report() {
        assert!(offers(&ApplicantStore::new(), OffersScope::Updates).is_none());
    }
}
