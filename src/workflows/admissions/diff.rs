use chrono::NaiveDate;
use tracing::debug;

use super::domain::{Applicant, Choice, ChoiceUpdate, InterviewUpdate};
use super::quality::{DataQualityIssue, DataQualitySink};

/// Classifies a choice against the same application slot in the preceding snapshot.
pub fn classify_update(choice: &Choice, previous: &[Choice]) -> ChoiceUpdate {
    match previous.iter().find(|earlier| earlier.id() == choice.id()) {
        None => ChoiceUpdate::New,
        Some(earlier) => {
            let course = earlier.course() != choice.course();
            let outcome = earlier.outcome() != choice.outcome();
            if course || outcome {
                ChoiceUpdate::Changed { course, outcome }
            } else {
                ChoiceUpdate::Unchanged
            }
        }
    }
}

/// Attaches snapshot choices to applicants, stamping each against the preceding snapshot
/// and tracking the earliest date each slot was seen at interview.
pub struct ChoiceDiffEngine<'a> {
    sink: &'a dyn DataQualitySink,
}

impl<'a> ChoiceDiffEngine<'a> {
    pub fn new(sink: &'a dyn DataQualitySink) -> Self {
        Self { sink }
    }

    /// Adds `choice` to `applicant` under `date`. With no `previous` snapshot the choice
    /// stays undetermined. Returns false when the slot is already held for `date`.
    pub fn absorb(
        &self,
        applicant: &mut Applicant,
        date: NaiveDate,
        previous: Option<NaiveDate>,
        mut choice: Choice,
    ) -> bool {
        if applicant.choice(date, choice.id()).is_some() {
            debug!(
                applicant = %applicant.display_name(),
                institution = %choice.institution(),
                "choice already recorded for this snapshot"
            );
            return false;
        }

        if choice.is_interview() {
            if let InterviewUpdate::Retained { kept } = applicant.record_interview(choice.id(), date) {
                self.sink.report(DataQualityIssue::InterviewDateRetained {
                    applicant: applicant.display_name().to_string(),
                    institution: choice.institution().to_string(),
                    kept,
                    seen: date,
                });
            }
        }

        if let Some(previous) = previous {
            let update = classify_update(&choice, applicant.choices(previous));
            choice.set_update(update);
        }

        applicant.add_choice(date, choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::domain::ChoiceId;
    use crate::workflows::admissions::quality::CollectingSink;
    use crate::workflows::feeds::status::StudentRecord;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).expect("valid date")
    }

    fn applicant() -> Applicant {
        Applicant::from_record(&StudentRecord {
            surname: "Smith".to_string(),
            forenames: "Jane".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2006, 3, 14).expect("valid date"),
            cycle_service_id: "1111111111".to_string(),
            cycle: "1".to_string(),
            postcode: "LS1 4AB".to_string(),
        })
    }

    fn choice(sequence: u32, institution: &str, course: &str, outcome: &str) -> Choice {
        Choice::new(
            ChoiceId {
                sequence,
                institution_code: institution.to_string(),
            },
            institution,
            "G100",
            course,
            outcome,
            "AAB",
        )
        .expect("valid outcome")
    }

    #[test]
    fn update_classification() {
        let previous = vec![
            choice(1, "L23", "Mathematics", "C"),
            choice(2, "M20", "Physics", "INV"),
        ];

        assert_eq!(
            classify_update(&choice(1, "L23", "Mathematics", "C"), &previous),
            ChoiceUpdate::Unchanged
        );
        assert_eq!(
            classify_update(&choice(1, "L23", "Mathematics", "CF"), &previous),
            ChoiceUpdate::Unchanged,
            "acceptance does not change the conditional outcome"
        );
        assert_eq!(
            classify_update(&choice(1, "L23", "Statistics", "C"), &previous),
            ChoiceUpdate::Changed {
                course: true,
                outcome: false
            }
        );
        assert_eq!(
            classify_update(&choice(2, "M20", "Astrophysics", "C"), &previous),
            ChoiceUpdate::Changed {
                course: true,
                outcome: true
            }
        );
        assert_eq!(
            classify_update(&choice(3, "L23", "Mathematics", "C"), &previous),
            ChoiceUpdate::New
        );
        assert_eq!(
            classify_update(&choice(1, "M20", "Physics", "INV"), &previous),
            ChoiceUpdate::New,
            "slot identity includes the institution"
        );
    }

    #[test]
    fn first_snapshot_leaves_choices_undetermined() {
        let sink = CollectingSink::new();
        let engine = ChoiceDiffEngine::new(&sink);
        let mut applicant = applicant();

        assert!(engine.absorb(&mut applicant, date(1), None, choice(1, "L23", "Maths", "C")));
        assert_eq!(applicant.choices(date(1))[0].update(), ChoiceUpdate::Undetermined);
    }

    #[test]
    fn later_snapshot_is_stamped_against_previous() {
        let sink = CollectingSink::new();
        let engine = ChoiceDiffEngine::new(&sink);
        let mut applicant = applicant();

        engine.absorb(&mut applicant, date(1), None, choice(1, "L23", "Maths", "INV"));
        engine.absorb(&mut applicant, date(8), Some(date(1)), choice(1, "L23", "Maths", "C"));
        engine.absorb(&mut applicant, date(8), Some(date(1)), choice(2, "M20", "Physics", "C"));

        let current = applicant.choices(date(8));
        assert_eq!(
            current[0].update(),
            ChoiceUpdate::Changed {
                course: false,
                outcome: true
            }
        );
        assert_eq!(current[1].update(), ChoiceUpdate::New);
        assert!(current[1].update().has_updated());
    }

    #[test]
    fn repeated_slot_in_one_snapshot_is_skipped() {
        let sink = CollectingSink::new();
        let engine = ChoiceDiffEngine::new(&sink);
        let mut applicant = applicant();

        assert!(engine.absorb(&mut applicant, date(1), None, choice(1, "L23", "Maths", "C")));
        assert!(!engine.absorb(&mut applicant, date(1), None, choice(1, "L23", "Maths", "REJ")));
        assert_eq!(applicant.choices(date(1)).len(), 1);
    }

    #[test]
    fn earliest_interview_date_is_kept_in_any_order() {
        let id = ChoiceId {
            sequence: 1,
            institution_code: "L23".to_string(),
        };

        let sink = CollectingSink::new();
        let engine = ChoiceDiffEngine::new(&sink);
        let mut forwards = applicant();
        engine.absorb(&mut forwards, date(1), None, choice(1, "L23", "Maths", "INV"));
        engine.absorb(&mut forwards, date(8), Some(date(1)), choice(1, "L23", "Maths", "INV"));
        assert_eq!(forwards.interview_date(&id), Some(date(1)));
        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::InterviewDateRetained { .. })),
            1
        );

        let sink = CollectingSink::new();
        let engine = ChoiceDiffEngine::new(&sink);
        let mut backwards = applicant();
        engine.absorb(&mut backwards, date(8), None, choice(1, "L23", "Maths", "INV"));
        engine.absorb(&mut backwards, date(1), None, choice(1, "L23", "Maths", "INV"));
        assert_eq!(backwards.interview_date(&id), Some(date(1)));
        assert!(sink.is_empty());
    }
}
