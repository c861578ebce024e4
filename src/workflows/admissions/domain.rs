use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::offer::Offer;
use super::validation::{validate, IdentifierKind, InvalidIdentifier};
use crate::workflows::feeds::status::{ChoiceRecord, StudentRecord};

/// Units that never count towards an achieved grade set (AQA baccalaureate).
const BACCALAUREATE_UNITS: [&str; 2] = ["9000", "9001"];

/// Identity of one application slot across snapshots: sequence number plus institution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChoiceId {
    pub sequence: u32,
    pub institution_code: String,
}

/// Decision state of a choice, derived from the raw outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Conditional,
    Unconditional,
    Withdrawn,
    Rejected,
    InvitedToInterview,
    Referred,
}

impl Outcome {
    pub fn from_code(code: &str) -> Result<Self, UnknownOutcome> {
        match code {
            "REJ" => return Ok(Self::Rejected),
            "INV" => return Ok(Self::InvitedToInterview),
            "REF" => return Ok(Self::Referred),
            _ => {}
        }
        match code.chars().next() {
            Some('C') => Ok(Self::Conditional),
            Some('U') => Ok(Self::Unconditional),
            Some('W') => Ok(Self::Withdrawn),
            _ => Err(UnknownOutcome(code.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Conditional => "Conditional Offer",
            Self::Unconditional => "Unconditional Offer",
            Self::Withdrawn => "Withdrawn",
            Self::Rejected => "Rejected",
            Self::InvitedToInterview => "Invited to Interview",
            Self::Referred => "Referred",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised outcome code '{0}'")]
pub struct UnknownOutcome(pub String);

/// How a choice differs from the same slot in the preceding snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceUpdate {
    /// No earlier snapshot to compare against.
    #[default]
    Undetermined,
    New,
    Unchanged,
    Changed { course: bool, outcome: bool },
}

impl ChoiceUpdate {
    pub const fn has_updated(self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Undetermined => "",
            Self::New => "New",
            Self::Unchanged => "Unchanged",
            Self::Changed {
                course: true,
                outcome: true,
            } => "Course and outcome changed",
            Self::Changed { course: true, .. } => "Course changed",
            Self::Changed { .. } => "Outcome changed",
        }
    }
}

/// One application to one course in one dated snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    id: ChoiceId,
    institution: String,
    course_code: String,
    course: String,
    outcome_code: String,
    outcome: Outcome,
    offer: Offer,
    update: ChoiceUpdate,
}

impl Choice {
    pub fn new(
        id: ChoiceId,
        institution: impl Into<String>,
        course_code: impl Into<String>,
        course: impl Into<String>,
        outcome_code: impl Into<String>,
        offer_text: &str,
    ) -> Result<Self, UnknownOutcome> {
        let outcome_code = outcome_code.into();
        let outcome = Outcome::from_code(&outcome_code)?;
        // Some institutions leave grades on an unconditional offer.
        let offer = match outcome {
            Outcome::Unconditional => Offer::empty(),
            _ => Offer::normalize(offer_text),
        };

        Ok(Self {
            id,
            institution: institution.into(),
            course_code: course_code.into(),
            course: course.into(),
            outcome_code,
            outcome,
            offer,
            update: ChoiceUpdate::Undetermined,
        })
    }

    pub fn from_record(record: &ChoiceRecord) -> Result<Self, UnknownOutcome> {
        Self::new(
            ChoiceId {
                sequence: record.sequence,
                institution_code: record.institution_code.clone(),
            },
            record.institution.as_str(),
            record.course_code.as_str(),
            record.course.as_str(),
            record.outcome_code.as_str(),
            &record.offer,
        )
    }

    pub fn id(&self) -> &ChoiceId {
        &self.id
    }

    pub fn institution(&self) -> &str {
        &self.institution
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn outcome_code(&self) -> &str {
        &self.outcome_code
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn update(&self) -> ChoiceUpdate {
        self.update
    }

    pub(crate) fn set_update(&mut self, update: ChoiceUpdate) {
        self.update = update;
    }

    pub fn is_firm(&self) -> bool {
        self.outcome_code.chars().nth(1) == Some('F')
    }

    pub fn is_insurance(&self) -> bool {
        self.outcome_code.chars().nth(1) == Some('I')
    }

    pub fn is_offer(&self) -> bool {
        !self.offer.is_empty()
    }

    pub fn is_interview(&self) -> bool {
        self.outcome == Outcome::InvitedToInterview
    }
}

/// Candidate identifiers carried on an exam board result line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateIds {
    pub uci: String,
    pub uln: String,
    pub exam_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultEntry {
    GradeOnly { grade: String },
    MarkAndGrade { mark: u32, grade: String },
    /// Unit marks; the grade shown is informational and never counts.
    MarkOnly { mark: u32, grade: String },
}

/// Exam board outcome for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub unit_code: String,
    pub candidate: CandidateIds,
    pub entry: ResultEntry,
}

impl ExamResult {
    /// The grade this result contributes to an achieved grade set, if any.
    pub fn grade(&self) -> Option<&str> {
        if BACCALAUREATE_UNITS.contains(&self.unit_code.as_str()) {
            return None;
        }
        match &self.entry {
            ResultEntry::GradeOnly { grade } | ResultEntry::MarkAndGrade { grade, .. } => {
                Some(grade.as_str()).filter(|grade| !grade.is_empty())
            }
            ResultEntry::MarkOnly { .. } => None,
        }
    }

    pub fn mark(&self) -> Option<u32> {
        match &self.entry {
            ResultEntry::GradeOnly { .. } => None,
            ResultEntry::MarkAndGrade { mark, .. } | ResultEntry::MarkOnly { mark, .. } => {
                Some(*mark)
            }
        }
    }
}

/// Optional identifiers gathered from SIMS and results feeds, plus the name hash.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecondaryIds {
    pub upn: Option<String>,
    pub uln: Option<String>,
    pub uci: Option<String>,
    pub exam_number: Option<String>,
    pub name_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSighting {
    pub choice: ChoiceId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewUpdate {
    Recorded,
    /// An earlier interview date is already held and was kept.
    Retained { kept: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionChange {
    Added,
    Updated { previous: String },
    Unchanged,
}

/// Counts of choices by decision for one snapshot date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChoiceCounts {
    pub unconditional: usize,
    pub conditional: usize,
    pub declined: usize,
    pub interviews: usize,
    pub referrals: usize,
    pub rejections: usize,
    pub withdrawals: usize,
    pub total: usize,
}

impl ChoiceCounts {
    pub fn offers(&self) -> usize {
        self.unconditional + self.conditional
    }

    pub fn open_offers(&self) -> usize {
        self.offers().saturating_sub(self.declined)
    }

    /// Choices the institution has ruled on.
    pub fn decisions(&self) -> usize {
        self.total
            .saturating_sub(self.referrals)
            .saturating_sub(self.interviews)
    }

    pub fn possible_offers(&self) -> usize {
        self.open_offers().saturating_sub(self.referrals)
    }

    /// Choices whose outcome matches none of the tallied categories.
    pub fn other(&self) -> usize {
        self.total.saturating_sub(
            self.unconditional
                + self.conditional
                + self.interviews
                + self.referrals
                + self.rejections
                + self.withdrawals,
        )
    }
}

/// One tracked individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Applicant {
    surname: String,
    forename1: String,
    forename2: String,
    display_name: String,
    date_of_birth: NaiveDate,
    postcode: String,
    cycle_service_id: String,
    cycle: String,
    ids: SecondaryIds,
    choices: BTreeMap<NaiveDate, Vec<Choice>>,
    interviews: Vec<InterviewSighting>,
    results: BTreeMap<String, ExamResult>,
    predictions: BTreeMap<String, String>,
    newly_seen: bool,
    current_cohort: Option<bool>,
}

impl Applicant {
    pub fn from_record(record: &StudentRecord) -> Self {
        let (forename1, forename2) = match record.forenames.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => (record.forenames.clone(), String::new()),
        };
        let display_name = format!("{} {}", record.surname.to_uppercase(), capitalize(&forename1));
        let name_hash = hex::encode(Sha256::digest(display_name.as_bytes()));

        Self {
            surname: record.surname.clone(),
            forename1,
            forename2,
            display_name,
            date_of_birth: record.date_of_birth,
            postcode: record.postcode.clone(),
            cycle_service_id: record.cycle_service_id.clone(),
            cycle: record.cycle.clone(),
            ids: SecondaryIds {
                name_hash,
                ..SecondaryIds::default()
            },
            choices: BTreeMap::new(),
            interviews: Vec::new(),
            results: BTreeMap::new(),
            predictions: BTreeMap::new(),
            newly_seen: true,
            current_cohort: None,
        }
    }

    /// `SURNAME Forename`, the order applicants are kept in.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    pub fn forename1(&self) -> &str {
        &self.forename1
    }

    pub fn forename2(&self) -> &str {
        &self.forename2
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    pub fn cycle_service_id(&self) -> &str {
        &self.cycle_service_id
    }

    pub fn cycle(&self) -> &str {
        &self.cycle
    }

    pub fn ids(&self) -> &SecondaryIds {
        &self.ids
    }

    pub fn identifier(&self, kind: IdentifierKind) -> Option<&str> {
        match kind {
            IdentifierKind::Upn => self.ids.upn.as_deref(),
            IdentifierKind::Uln => self.ids.uln.as_deref(),
            IdentifierKind::Uci => self.ids.uci.as_deref(),
            IdentifierKind::ExamNumber => self.ids.exam_number.as_deref(),
        }
    }

    /// Assigns a secondary identifier after a shape check; on failure the field is unchanged.
    pub fn set_identifier(
        &mut self,
        kind: IdentifierKind,
        value: &str,
    ) -> Result<(), InvalidIdentifier> {
        validate(kind, value)?;
        let slot = match kind {
            IdentifierKind::Upn => &mut self.ids.upn,
            IdentifierKind::Uln => &mut self.ids.uln,
            IdentifierKind::Uci => &mut self.ids.uci,
            IdentifierKind::ExamNumber => &mut self.ids.exam_number,
        };
        *slot = Some(value.to_string());
        Ok(())
    }

    /// Match by any key: the service id, or any of UPN, UCI or ULN present on both.
    /// Not transitive across three or more applicants.
    pub fn same_individual(&self, other: &Applicant) -> bool {
        if self.cycle_service_id == other.cycle_service_id {
            return true;
        }
        [IdentifierKind::Uci, IdentifierKind::Upn, IdentifierKind::Uln]
            .into_iter()
            .any(|kind| match (self.identifier(kind), other.identifier(kind)) {
                (Some(mine), Some(theirs)) => !mine.is_empty() && mine == theirs,
                _ => false,
            })
    }

    pub fn is_newly_seen(&self) -> bool {
        self.newly_seen
    }

    pub(crate) fn mark_seen(&mut self) {
        self.newly_seen = false;
    }

    pub fn current_cohort(&self) -> Option<bool> {
        self.current_cohort
    }

    pub fn set_current_cohort(&mut self, current: bool) {
        self.current_cohort = Some(current);
    }

    pub fn snapshot_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.choices.keys().copied()
    }

    pub fn choices(&self, date: NaiveDate) -> &[Choice] {
        self.choices.get(&date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn choice(&self, date: NaiveDate, id: &ChoiceId) -> Option<&Choice> {
        self.choices(date).iter().find(|choice| choice.id() == id)
    }

    /// Adds a choice to a snapshot date unless that slot is already present there.
    pub fn add_choice(&mut self, date: NaiveDate, choice: Choice) -> bool {
        let choices = self.choices.entry(date).or_default();
        if choices.iter().any(|existing| existing.id() == choice.id()) {
            return false;
        }
        choices.push(choice);
        true
    }

    pub fn firm(&self, date: NaiveDate) -> Option<&Choice> {
        self.choices(date).iter().find(|choice| choice.is_firm())
    }

    pub fn insurance(&self, date: NaiveDate) -> Option<&Choice> {
        self.choices(date).iter().find(|choice| choice.is_insurance())
    }

    pub fn interview_date(&self, id: &ChoiceId) -> Option<NaiveDate> {
        self.interviews
            .iter()
            .find(|sighting| &sighting.choice == id)
            .map(|sighting| sighting.date)
    }

    /// Keeps the earliest interview date seen for a choice slot.
    pub fn record_interview(&mut self, id: &ChoiceId, date: NaiveDate) -> InterviewUpdate {
        match self.interviews.iter_mut().find(|sighting| &sighting.choice == id) {
            Some(sighting) if sighting.date < date => InterviewUpdate::Retained {
                kept: sighting.date,
            },
            Some(sighting) => {
                sighting.date = date;
                InterviewUpdate::Recorded
            }
            None => {
                self.interviews.push(InterviewSighting {
                    choice: id.clone(),
                    date,
                });
                InterviewUpdate::Recorded
            }
        }
    }

    /// Records a result unless one is already held for the unit; the original is kept.
    pub fn add_result(&mut self, result: ExamResult) -> bool {
        if self.results.contains_key(&result.unit_code) {
            return false;
        }
        self.results.insert(result.unit_code.clone(), result);
        true
    }

    pub fn results(&self) -> &BTreeMap<String, ExamResult> {
        &self.results
    }

    pub fn result(&self, unit_code: &str) -> Option<&ExamResult> {
        self.results.get(unit_code)
    }

    /// Grades from grade-bearing results combined into one offer.
    pub fn results_as_offer(&self) -> Offer {
        let grades: String = self.results.values().filter_map(ExamResult::grade).collect();
        Offer::normalize(&grades)
    }

    pub fn add_prediction(&mut self, subject: &str, grade: &str) -> PredictionChange {
        match self.predictions.insert(subject.to_string(), grade.to_string()) {
            None => PredictionChange::Added,
            Some(previous) if previous == grade => PredictionChange::Unchanged,
            Some(previous) => PredictionChange::Updated { previous },
        }
    }

    pub fn predictions(&self) -> &BTreeMap<String, String> {
        &self.predictions
    }

    pub fn predictions_as_offer(&self) -> Offer {
        let grades: String = self.predictions.values().map(String::as_str).collect();
        Offer::normalize(&grades)
    }

    pub fn choice_counts(&self, date: NaiveDate) -> ChoiceCounts {
        let mut counts = ChoiceCounts::default();
        for choice in self.choices(date) {
            let code = choice.outcome_code();
            counts.total += 1;
            match choice.outcome() {
                Outcome::Unconditional => counts.unconditional += 1,
                Outcome::Conditional => counts.conditional += 1,
                Outcome::InvitedToInterview => counts.interviews += 1,
                Outcome::Referred => counts.referrals += 1,
                Outcome::Rejected => counts.rejections += 1,
                Outcome::Withdrawn if code == "W" => counts.withdrawals += 1,
                Outcome::Withdrawn => {}
            }
            if code.starts_with("CD") || code.starts_with("UD") {
                counts.declined += 1;
            }
        }
        counts
    }

    /// Insurance offer valued at or above the firm offer.
    pub fn acceptance_anomaly(&self, date: NaiveDate) -> bool {
        match (self.firm(date), self.insurance(date)) {
            (Some(firm), Some(insurance)) => {
                firm.offer().grade_value() <= insurance.offer().grade_value()
            }
            _ => false,
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
