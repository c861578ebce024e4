use std::collections::BTreeSet;

use tracing::debug;

use super::quality::{DataQualityIssue, DataQualitySink};
use super::store::ApplicantStore;
use crate::workflows::feeds::sims::IdentityRecord;

/// Matches identity records from other feeds to tracked applicants.
pub struct IdentityResolver<'a> {
    sink: &'a dyn DataQualitySink,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(sink: &'a dyn DataQualitySink) -> Self {
        Self { sink }
    }

    /// Index of the tracked applicant `record` describes.
    ///
    /// Tries the UPN first, then applicants sharing both date of birth and postcode, using
    /// the name to separate several. When nobody shares both, a name match among those
    /// sharing either one is accepted with a warning.
    pub fn resolve(&self, store: &ApplicantStore, record: &IdentityRecord) -> Option<usize> {
        if let Some(index) = record.upn.as_deref().and_then(|upn| store.by_upn(upn)) {
            return Some(index);
        }

        let by_dob: BTreeSet<usize> = record
            .date_of_birth
            .map(|dob| store.by_dob(dob).into_iter().collect())
            .unwrap_or_default();
        let by_postcode: BTreeSet<usize> = record
            .postcode
            .as_deref()
            .map(|postcode| store.by_postcode(postcode).into_iter().collect())
            .unwrap_or_default();

        let both: Vec<usize> = by_dob.intersection(&by_postcode).copied().collect();
        match both.as_slice() {
            [only] => Some(*only),
            [] => {
                let either: Vec<usize> = by_dob.union(&by_postcode).copied().collect();
                let found = self.match_by_name(store, record, &either)?;
                self.sink.report(DataQualityIssue::NameOnlyMatch {
                    applicant: display_name(store, found),
                });
                Some(found)
            }
            several => self.match_by_name(store, record, several),
        }
    }

    /// First candidate whose surname and first forename equal the record's. Reports an
    /// ambiguity when more than one candidate carries the same name.
    fn match_by_name(
        &self,
        store: &ApplicantStore,
        record: &IdentityRecord,
        candidates: &[usize],
    ) -> Option<usize> {
        let surname = record.surname.as_deref()?;
        let forename = record.forename.as_deref()?;

        let mut named = candidates.iter().copied().filter(|index| {
            store.applicant(*index).is_some_and(|applicant| {
                applicant.surname() == surname && applicant.forename1() == forename
            })
        });
        let first = named.next()?;
        if named.next().is_some() {
            self.sink.report(DataQualityIssue::AmbiguousMatch {
                subject: format!("{surname} {forename}"),
                chosen: display_name(store, first),
            });
        }
        debug!(applicant = %display_name(store, first), "matched by name");
        Some(first)
    }

    /// Reports when the exam number held by `index` is also held by another applicant.
    pub fn check_exam_number(&self, store: &ApplicantStore, index: usize) {
        let Some(exam_number) = store
            .applicant(index)
            .and_then(|applicant| applicant.ids().exam_number.clone())
        else {
            return;
        };

        let holders = store.by_exam_number(&exam_number);
        if holders.len() > 1 {
            self.sink.report(DataQualityIssue::DuplicateExamNumber {
                exam_number,
                applicants: holders
                    .into_iter()
                    .map(|holder| display_name(store, holder))
                    .collect(),
            });
        }
    }
}

fn display_name(store: &ApplicantStore, index: usize) -> String {
    store
        .applicant(index)
        .map(|applicant| applicant.display_name().to_string())
        .unwrap_or_default()
}
