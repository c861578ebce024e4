use std::io::Read;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::diff::ChoiceDiffEngine;
use super::domain::{Choice, PredictionChange};
use super::identity::IdentityResolver;
use super::quality::{DataQualityIssue, DataQualitySink};
use super::store::{ApplicantStore, StudentInsert};
use super::subjects::SubjectCatalog;
use super::validation::IdentifierKind;
use crate::config::TenantConfig;
use crate::workflows::feeds::basedata::parse_subject_line;
use crate::workflows::feeds::predictions::PredictionRow;
use crate::workflows::feeds::results::{centre_number, parse_result_line};
use crate::workflows::feeds::sims::IdentityRecord;
use crate::workflows::feeds::status::{SnapshotFile, SnapshotLine, SnapshotReader};
use crate::workflows::feeds::{ExamLine, FeedError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("snapshot is for establishment {found}, this installation is licensed to {expected}")]
    EstablishmentMismatch { expected: String, found: String },
    #[error("no subject basedata loaded")]
    NoBasedata,
    #[error("no applicant data loaded")]
    NoApplicants,
}

/// What absorbing one snapshot did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Absorbed {
        date: NaiveDate,
        students: usize,
        choices: usize,
    },
    AlreadyPresent(NaiveDate),
}

/// Feeds external data into the applicant store, reporting dirty data to the sink.
pub struct AdmissionsImporter<'a> {
    establishment_no: String,
    centre_no: String,
    sink: &'a dyn DataQualitySink,
}

impl<'a> AdmissionsImporter<'a> {
    pub fn new(tenant: &TenantConfig, sink: &'a dyn DataQualitySink) -> Self {
        Self {
            establishment_no: tenant.establishment_no.clone(),
            centre_no: tenant.centre_no.clone(),
            sink,
        }
    }

    /// Absorbs every snapshot not yet in the store, oldest first whatever order they
    /// were found in.
    pub fn import_snapshots(
        &self,
        store: &mut ApplicantStore,
        files: &[SnapshotFile],
    ) -> Result<Vec<SnapshotOutcome>, ImportError> {
        let mut ordered: Vec<&SnapshotFile> = files.iter().collect();
        ordered.sort_by_key(|file| file.date);

        let mut outcomes = Vec::with_capacity(ordered.len());
        for file in ordered {
            info!(path = %file.path.display(), date = %file.date, "importing snapshot");
            let reader = SnapshotReader::open(&file.path)?;
            outcomes.push(self.absorb_snapshot(store, reader)?);
        }
        Ok(outcomes)
    }

    /// Absorbs one snapshot. A snapshot for another establishment is fatal; a date
    /// already in the store is left untouched.
    pub fn absorb_snapshot<R: Read>(
        &self,
        store: &mut ApplicantStore,
        reader: SnapshotReader<R>,
    ) -> Result<SnapshotOutcome, ImportError> {
        if reader.establishment() != self.establishment_no {
            return Err(ImportError::EstablishmentMismatch {
                expected: self.establishment_no.clone(),
                found: reader.establishment().to_string(),
            });
        }

        let date = reader.date();
        if store.contains_date(date) {
            debug!(%date, "snapshot already absorbed");
            return Ok(SnapshotOutcome::AlreadyPresent(date));
        }

        let historic = store.current_date().is_some_and(|current| date < current);
        store.add_date(date);
        let previous = store.date_before(date);
        debug!(%date, ?previous, historic, "absorbing snapshot");

        let engine = ChoiceDiffEngine::new(self.sink);
        let mut current: Option<usize> = None;
        let (mut students, mut choices) = (0, 0);

        for line in reader {
            match line? {
                SnapshotLine::Student(record) => {
                    let (index, placement) = store.add_student(&record, historic);
                    if placement == StudentInsert::InsertedHistoric {
                        self.sink.report(DataQualityIssue::HistoricOnlyApplicant {
                            applicant: store
                                .applicant(index)
                                .map(|applicant| applicant.display_name().to_string())
                                .unwrap_or_default(),
                        });
                    }
                    current = Some(index);
                    students += 1;
                }
                SnapshotLine::Choice(record) => {
                    let Some(applicant) = current.and_then(|index| store.applicant_mut(index))
                    else {
                        self.sink.report(DataQualityIssue::UnrecognizedLine {
                            line: format!("choice {} at {} before any applicant", record.sequence, record.institution),
                        });
                        continue;
                    };
                    match Choice::from_record(&record) {
                        Ok(choice) => {
                            if engine.absorb(applicant, date, previous, choice) {
                                choices += 1;
                            }
                        }
                        Err(err) => self.sink.report(DataQualityIssue::InvalidChoice {
                            applicant: applicant.display_name().to_string(),
                            reason: err.to_string(),
                        }),
                    }
                }
                SnapshotLine::Unrecognized(line) => {
                    self.sink.report(DataQualityIssue::UnrecognizedLine { line })
                }
            }
        }

        info!(%date, students, choices, "snapshot absorbed");
        Ok(SnapshotOutcome::Absorbed {
            date,
            students,
            choices,
        })
    }

    /// Reads unit definitions, keeping A-level subjects only. Returns how many were kept.
    pub fn import_basedata<I>(&self, catalog: &mut SubjectCatalog, lines: I) -> Result<usize, ImportError>
    where
        I: IntoIterator<Item = Result<String, FeedError>>,
    {
        let mut kept = 0;
        for line in lines {
            let line = line?;
            match parse_subject_line(&line) {
                ExamLine::Record(subject) if subject.is_alevel() => {
                    catalog.insert(subject);
                    kept += 1;
                }
                ExamLine::Record(subject) => {
                    debug!(subject = %subject, "dropping non A level subject");
                }
                ExamLine::Header => debug!(line = %line, "skipping basedata header"),
                ExamLine::Malformed(line) => {
                    self.sink.report(DataQualityIssue::UnrecognizedLine { line })
                }
            }
        }
        info!(kept, total = catalog.len(), "basedata imported");
        Ok(kept)
    }

    /// Attaches A-level results to applicants found by UCI. Returns how many were added.
    pub fn import_results<I>(
        &self,
        store: &mut ApplicantStore,
        catalog: &SubjectCatalog,
        lines: I,
    ) -> Result<usize, ImportError>
    where
        I: IntoIterator<Item = Result<String, FeedError>>,
    {
        if catalog.is_empty() {
            return Err(ImportError::NoBasedata);
        }
        if !store.is_loaded() {
            return Err(ImportError::NoApplicants);
        }

        let mut added = 0;
        for line in lines {
            let line = line?;
            if let Some(centre) = centre_number(&line).filter(|centre| *centre != self.centre_no) {
                warn!(centre, expected = %self.centre_no, "result line from another centre");
            }

            let result = match parse_result_line(&line) {
                ExamLine::Record(result) => result,
                ExamLine::Header => {
                    debug!(line = %line, "skipping results header");
                    continue;
                }
                ExamLine::Malformed(line) => {
                    self.sink.report(DataQualityIssue::UnrecognizedLine { line });
                    continue;
                }
            };

            let Some(subject) = catalog.by_unit_code(&result.unit_code) else {
                self.sink.report(DataQualityIssue::UnknownSubject {
                    unit_code: result.unit_code.clone(),
                });
                continue;
            };
            if !subject.is_alevel() {
                self.sink.report(DataQualityIssue::NonAlevelResult {
                    level: subject.qualification_level.clone(),
                    subject: subject.name.clone(),
                });
                continue;
            }

            let Some(applicant) = store
                .by_uci(&result.candidate.uci)
                .and_then(|index| store.applicant_mut(index))
            else {
                self.sink.report(DataQualityIssue::IdentityNotFound {
                    feed: "results",
                    subject: result.candidate.uci.clone(),
                });
                continue;
            };

            let unit_code = result.unit_code.clone();
            if applicant.add_result(result) {
                added += 1;
            } else {
                self.sink.report(DataQualityIssue::DuplicateResult {
                    applicant: applicant.display_name().to_string(),
                    unit_code,
                });
            }
        }

        info!(added, "results imported");
        Ok(added)
    }

    /// Copies secondary identifiers from a student information system extract onto the
    /// applicants they resolve to. Returns how many applicants were updated.
    pub fn import_identities(
        &self,
        store: &mut ApplicantStore,
        records: &[IdentityRecord],
    ) -> Result<usize, ImportError> {
        if !store.is_loaded() {
            return Err(ImportError::NoApplicants);
        }

        let resolver = IdentityResolver::new(self.sink);
        let mut updated = 0;
        for record in records {
            let Some(index) = resolver.resolve(store, record) else {
                self.sink.report(DataQualityIssue::IdentityNotFound {
                    feed: "student information",
                    subject: describe(record),
                });
                continue;
            };
            let Some(applicant) = store.applicant_mut(index) else {
                continue;
            };

            let identifiers = [
                (IdentifierKind::Upn, &record.upn),
                (IdentifierKind::Uln, &record.uln),
                (IdentifierKind::Uci, &record.uci),
                (IdentifierKind::ExamNumber, &record.exam_number),
            ];
            for (kind, value) in identifiers {
                let Some(value) = value.as_deref() else {
                    continue;
                };
                if let Err(source) = applicant.set_identifier(kind, value) {
                    self.sink.report(DataQualityIssue::InvalidIdentifier {
                        applicant: applicant.display_name().to_string(),
                        source,
                    });
                }
            }
            if let Some(current) = record.current_cohort {
                applicant.set_current_cohort(current);
            }
            debug!(applicant = %applicant.display_name(), "identifiers updated");
            updated += 1;

            if record.exam_number.is_some() {
                resolver.check_exam_number(store, index);
            }
        }

        info!(updated, rows = records.len(), "student details imported");
        Ok(updated)
    }

    /// Adds marksheet predictions to applicants found by UPN. Returns how many
    /// predictions were added or changed.
    pub fn import_predictions(
        &self,
        store: &mut ApplicantStore,
        rows: &[PredictionRow],
    ) -> Result<usize, ImportError> {
        if !store.is_loaded() {
            return Err(ImportError::NoApplicants);
        }

        let mut changed = 0;
        for row in rows {
            let Some(applicant) = row
                .upn
                .as_deref()
                .and_then(|upn| store.by_upn(upn))
                .and_then(|index| store.applicant_mut(index))
            else {
                self.sink.report(DataQualityIssue::IdentityNotFound {
                    feed: "marksheet",
                    subject: row.upn.clone().unwrap_or_else(|| "a row without UPN".to_string()),
                });
                continue;
            };

            for (subject, grade) in &row.rejected {
                self.sink.report(DataQualityIssue::IgnoredPrediction {
                    applicant: applicant.display_name().to_string(),
                    subject: subject.clone(),
                    grade: grade.clone(),
                });
            }

            for (subject, grade) in &row.grades {
                match applicant.add_prediction(subject, grade) {
                    PredictionChange::Added => {
                        debug!(applicant = %applicant.display_name(), %subject, %grade, "prediction added");
                        changed += 1;
                    }
                    PredictionChange::Updated { previous } => {
                        info!(
                            applicant = %applicant.display_name(),
                            %subject,
                            from = %previous,
                            to = %grade,
                            "prediction updated"
                        );
                        changed += 1;
                    }
                    PredictionChange::Unchanged => {}
                }
            }
        }

        info!(changed, rows = rows.len(), "predictions imported");
        Ok(changed)
    }
}

fn describe(record: &IdentityRecord) -> String {
    let name = [record.surname.as_deref(), record.forename.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    match record.date_of_birth {
        Some(dob) => format!("{name} born {dob}"),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::domain::ExamResult;
    use crate::workflows::admissions::quality::CollectingSink;
    use crate::workflows::admissions::subjects::{Subject, ALEVEL};
    use crate::workflows::feeds::results::result_line_for_tests;
    use std::io::Cursor;

    fn tenant() -> TenantConfig {
        TenantConfig {
            establishment_no: "12345".to_string(),
            centre_no: "67890".to_string(),
            app_year: 2024,
        }
    }

    fn snapshot(date: &str, establishment: &str, body: &str) -> SnapshotReader<Cursor<String>> {
        let data = format!(
            "{:<42}{date}\n{establishment},Example Sixth Form\n{body}",
            "Applicant status report produced on"
        );
        SnapshotReader::from_reader(Cursor::new(data)).expect("header parses")
    }

    const SMITH: &str = "Smith,Jane,14-MAR-06,1111111111,1,x,x,x,x,LS1 4AB\n";

    fn loaded_store(sink: &CollectingSink) -> ApplicantStore {
        let mut store = ApplicantStore::new();
        let body = format!("{SMITH}1,L23,Leeds,G100,x,C,AAB,Maths,2024\n");
        AdmissionsImporter::new(&tenant(), sink)
            .absorb_snapshot(&mut store, snapshot("10/01/2024", "12345", &body))
            .expect("snapshot absorbs");
        store
    }

    fn lines(items: &[String]) -> Vec<Result<String, FeedError>> {
        items.iter().cloned().map(Ok).collect()
    }

    #[test]
    fn establishment_mismatch_is_fatal() {
        let sink = CollectingSink::new();
        let mut store = ApplicantStore::new();
        let result = AdmissionsImporter::new(&tenant(), &sink)
            .absorb_snapshot(&mut store, snapshot("10/01/2024", "99999", SMITH));
        assert!(matches!(result, Err(ImportError::EstablishmentMismatch { .. })));
        assert!(store.dates().is_empty());
    }

    #[test]
    fn orphan_choice_and_junk_lines_are_reported() {
        let sink = CollectingSink::new();
        let mut store = ApplicantStore::new();
        let body = "1,L23,Leeds,G100,x,C,AAB,Maths,2024\nTotals,,,\n";
        let outcome = AdmissionsImporter::new(&tenant(), &sink)
            .absorb_snapshot(&mut store, snapshot("10/01/2024", "12345", body))
            .expect("snapshot absorbs");

        assert!(matches!(
            outcome,
            SnapshotOutcome::Absorbed {
                students: 0,
                choices: 0,
                ..
            }
        ));
        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::UnrecognizedLine { .. })),
            2
        );
    }

    #[test]
    fn unknown_outcome_code_skips_choice() {
        let sink = CollectingSink::new();
        let mut store = ApplicantStore::new();
        let body = format!("{SMITH}1,L23,Leeds,G100,x,XYZ,AAB,Maths,2024\n");
        AdmissionsImporter::new(&tenant(), &sink)
            .absorb_snapshot(&mut store, snapshot("10/01/2024", "12345", &body))
            .expect("snapshot absorbs");

        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::InvalidChoice { .. })),
            1
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date");
        assert!(store.applicants()[0].choices(date).is_empty());
    }

    #[test]
    fn older_snapshot_flags_new_applicants_as_historic() {
        let sink = CollectingSink::new();
        let mut store = loaded_store(&sink);
        let body = "Jones,Amy,01-MAY-06,2222222222,1,x,x,x,x,YO1 7HH\n";
        AdmissionsImporter::new(&tenant(), &sink)
            .absorb_snapshot(&mut store, snapshot("02/01/2024", "12345", body))
            .expect("snapshot absorbs");

        assert_eq!(
            sink.issues(),
            vec![DataQualityIssue::HistoricOnlyApplicant {
                applicant: "JONES Amy".to_string()
            }]
        );
    }

    #[test]
    fn results_need_basedata_and_applicants() {
        let sink = CollectingSink::new();
        let importer = AdmissionsImporter::new(&tenant(), &sink);
        let mut empty = ApplicantStore::new();
        let catalog = SubjectCatalog::new();
        assert!(matches!(
            importer.import_results(&mut empty, &catalog, Vec::new()),
            Err(ImportError::NoBasedata)
        ));

        let catalog = SubjectCatalog::from_subjects(vec![Subject {
            unit_code: "7357".to_string(),
            spec_code: "7357".to_string(),
            qualification_level: ALEVEL.to_string(),
            unit_type: 'C',
            name: "Mathematics".to_string(),
            max_ums: 0,
            sims_name: None,
        }]);
        assert!(matches!(
            importer.import_results(&mut empty, &catalog, Vec::new()),
            Err(ImportError::NoApplicants)
        ));
    }

    #[test]
    fn results_attach_by_uci_and_skip_unknown_units() {
        let sink = CollectingSink::new();
        let mut store = loaded_store(&sink);
        store
            .applicant_mut(0)
            .expect("tracked")
            .set_identifier(IdentifierKind::Uci, "123456789012A")
            .expect("valid uci");

        let catalog = SubjectCatalog::from_subjects(vec![
            Subject {
                unit_code: "7357".to_string(),
                spec_code: "7357".to_string(),
                qualification_level: ALEVEL.to_string(),
                unit_type: '1',
                name: "Mathematics".to_string(),
                max_ums: 0,
                sims_name: None,
            },
            Subject {
                unit_code: "8300".to_string(),
                spec_code: "8300".to_string(),
                qualification_level: "GCSEFC".to_string(),
                unit_type: '1',
                name: "GCSE Mathematics".to_string(),
                max_ums: 0,
                sims_name: None,
            },
        ]);
        let feed = [
            "R1 header".to_string(),
            result_line_for_tests("123456789012A", "0042", "7357  1A "),
            result_line_for_tests("123456789012A", "0042", "8300  19 "),
            result_line_for_tests("123456789012A", "0042", "9999  1B "),
            result_line_for_tests("999999999999Z", "0043", "7357  1B "),
            result_line_for_tests("123456789012A", "0042", "7357  1C "),
        ];

        let added = AdmissionsImporter::new(&tenant(), &sink)
            .import_results(&mut store, &catalog, lines(&feed))
            .expect("results import");

        assert_eq!(added, 1);
        assert_eq!(
            store.applicants()[0].result("7357").and_then(ExamResult::grade),
            Some("A")
        );
        let issues = sink.issues();
        assert!(issues.iter().any(|i| matches!(i, DataQualityIssue::NonAlevelResult { .. })));
        assert!(issues.iter().any(|i| matches!(i, DataQualityIssue::UnknownSubject { .. })));
        assert!(issues.iter().any(|i| matches!(i, DataQualityIssue::IdentityNotFound { .. })));
        assert!(issues.iter().any(|i| matches!(i, DataQualityIssue::DuplicateResult { .. })));
    }

    #[test]
    fn identities_are_validated_before_assignment() {
        let sink = CollectingSink::new();
        let mut store = loaded_store(&sink);
        let record = IdentityRecord {
            surname: Some("Smith".to_string()),
            forename: Some("Jane".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(2006, 3, 14),
            postcode: Some("LS1 4AB".to_string()),
            upn: Some("A123456789012".to_string()),
            uln: Some("12345".to_string()),
            exam_number: Some("0042".to_string()),
            current_cohort: Some(true),
            ..IdentityRecord::default()
        };
        let missing = IdentityRecord {
            surname: Some("Nobody".to_string()),
            ..IdentityRecord::default()
        };

        let updated = AdmissionsImporter::new(&tenant(), &sink)
            .import_identities(&mut store, &[record, missing])
            .expect("identities import");

        assert_eq!(updated, 1);
        let applicant = &store.applicants()[0];
        assert_eq!(applicant.identifier(IdentifierKind::Upn), Some("A123456789012"));
        assert_eq!(applicant.identifier(IdentifierKind::Uln), None);
        assert_eq!(applicant.identifier(IdentifierKind::ExamNumber), Some("0042"));
        assert_eq!(applicant.current_cohort(), Some(true));
        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::InvalidIdentifier { .. })),
            1
        );
        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::IdentityNotFound { .. })),
            1
        );
    }

    #[test]
    fn predictions_attach_by_upn() {
        let sink = CollectingSink::new();
        let mut store = loaded_store(&sink);
        store
            .applicant_mut(0)
            .expect("tracked")
            .set_identifier(IdentifierKind::Upn, "A123456789012")
            .expect("valid upn");

        let rows = vec![
            PredictionRow {
                upn: Some("A123456789012".to_string()),
                grades: vec![
                    ("Ma".to_string(), "A".to_string()),
                    ("Ph".to_string(), "B".to_string()),
                ],
                rejected: vec![("Ch".to_string(), "Dist".to_string())],
            },
            PredictionRow {
                upn: Some("B123456789012".to_string()),
                ..PredictionRow::default()
            },
        ];

        let importer = AdmissionsImporter::new(&tenant(), &sink);
        assert_eq!(importer.import_predictions(&mut store, &rows).expect("import"), 2);
        assert_eq!(importer.import_predictions(&mut store, &rows).expect("import"), 0);
        assert_eq!(store.applicants()[0].predictions_as_offer().grades(), "AB");
        assert_eq!(
            sink.count(|issue| matches!(issue, DataQualityIssue::IgnoredPrediction { .. })),
            2
        );
    }
}
