use chrono::NaiveDate;
use tracing::debug;

use super::domain::Applicant;
use super::validation::IdentifierKind;
use crate::workflows::feeds::status::StudentRecord;

/// How [`ApplicantStore::add_student`] placed a snapshot student line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentInsert {
    Inserted,
    /// New applicant found while absorbing an older snapshot than the current one.
    InsertedHistoric,
    Existing,
}

/// In-memory registry of tracked applicants.
///
/// Applicants stay sorted by display name; snapshot dates stay ordered most recent first.
#[derive(Debug, Clone, Default)]
pub struct ApplicantStore {
    applicants: Vec<Applicant>,
    dates: Vec<NaiveDate>,
}

impl ApplicantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted parts, restoring both ordering invariants.
    pub fn from_parts(mut dates: Vec<NaiveDate>, mut applicants: Vec<Applicant>) -> Self {
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        applicants.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        Self { applicants, dates }
    }

    pub fn into_parts(self) -> (Vec<NaiveDate>, Vec<Applicant>) {
        (self.dates, self.applicants)
    }

    pub fn is_loaded(&self) -> bool {
        !self.applicants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.applicants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applicants.is_empty()
    }

    pub fn applicants(&self) -> &[Applicant] {
        &self.applicants
    }

    pub fn applicant(&self, index: usize) -> Option<&Applicant> {
        self.applicants.get(index)
    }

    pub fn applicant_mut(&mut self, index: usize) -> Option<&mut Applicant> {
        self.applicants.get_mut(index)
    }

    /// Adds the applicant on a snapshot student line, or finds the one already tracked
    /// and clears its newly-seen flag. Returns the applicant's index.
    pub fn add_student(&mut self, record: &StudentRecord, historic: bool) -> (usize, StudentInsert) {
        let candidate = Applicant::from_record(record);

        if let Some(index) = self
            .applicants
            .iter()
            .position(|existing| existing.same_individual(&candidate))
        {
            self.applicants[index].mark_seen();
            return (index, StudentInsert::Existing);
        }

        let index = self
            .applicants
            .partition_point(|existing| existing.display_name() <= candidate.display_name());
        debug!(applicant = %candidate.display_name(), index, "tracking new applicant");
        self.applicants.insert(index, candidate);

        let placement = if historic {
            StudentInsert::InsertedHistoric
        } else {
            StudentInsert::Inserted
        };
        (index, placement)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Inserts a snapshot date keeping the most recent first. Callers check
    /// [`ApplicantStore::contains_date`] beforehand; a repeated date is inserted again.
    pub fn add_date(&mut self, date: NaiveDate) {
        let index = self.dates.partition_point(|existing| *existing >= date);
        self.dates.insert(index, date);
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn previous_date(&self) -> Option<NaiveDate> {
        self.dates.get(1).copied()
    }

    /// Latest snapshot date strictly earlier than `date`.
    pub fn date_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates.iter().copied().find(|existing| *existing < date)
    }

    pub fn by_identifier(&self, kind: IdentifierKind, value: &str) -> Option<usize> {
        self.applicants
            .iter()
            .position(|applicant| applicant.identifier(kind) == Some(value))
    }

    pub fn by_upn(&self, upn: &str) -> Option<usize> {
        self.by_identifier(IdentifierKind::Upn, upn)
    }

    pub fn by_uci(&self, uci: &str) -> Option<usize> {
        self.by_identifier(IdentifierKind::Uci, uci)
    }

    pub fn by_exam_number(&self, exam_number: &str) -> Vec<usize> {
        self.positions(|applicant| applicant.identifier(IdentifierKind::ExamNumber) == Some(exam_number))
    }

    pub fn by_dob(&self, date_of_birth: NaiveDate) -> Vec<usize> {
        self.positions(|applicant| applicant.date_of_birth() == date_of_birth)
    }

    pub fn by_postcode(&self, postcode: &str) -> Vec<usize> {
        self.positions(|applicant| applicant.postcode() == postcode)
    }

    fn positions(&self, matches: impl Fn(&Applicant) -> bool) -> Vec<usize> {
        self.applicants
            .iter()
            .enumerate()
            .filter(|(_, applicant)| matches(applicant))
            .map(|(index, _)| index)
            .collect()
    }
}
