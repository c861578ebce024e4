use admissions_tracker::config::TenantConfig;
use admissions_tracker::workflows::admissions::report::{
    applicant_summary, at_risk, destinations, ApplicantStatus, Destination, RiskBasis, RiskLevel,
};
use admissions_tracker::workflows::admissions::{
    AdmissionsImporter, ApplicantStore, CollectingSink, DataQualityIssue, GradeComparison,
    ImportError, SubjectCatalog,
};
use admissions_tracker::workflows::feeds::predictions::{read_prediction_rows, HeadingPattern};
use admissions_tracker::workflows::feeds::sims::read_identity_records;
use admissions_tracker::workflows::feeds::status::SnapshotReader;
use admissions_tracker::workflows::feeds::{exam_files, FeedError, FeedLines};
use std::fs;
use std::io::Cursor;
use std::path::Path;

const SMITH_UCI: &str = "123456789012A";
const JONES_UCI: &str = "210987654321B";

fn tenant() -> TenantConfig {
    TenantConfig {
        establishment_no: "12345".to_string(),
        centre_no: "67890".to_string(),
        app_year: 2024,
    }
}

fn snapshot_store(sink: &CollectingSink) -> ApplicantStore {
    let data = format!(
        "{:<42}15/08/2024\n12345,Example Sixth Form\n\
         Smith,Jane,14-MAR-06,1111111111,1,x,x,x,x,LS1 4AB\n\
         1,L23,Leeds,G100,x,CF,AAA,Mathematics,2024\n\
         2,Y50,York,G100,x,CI,BBB,Mathematics,2024\n\
         Jones,Ben,02-JAN-06,3333333333,1,x,x,x,x,YO1 7HH\n\
         1,D86,Durham,F300,x,CF,A*AA,Physics,2024\n",
        "Applicant status report produced on"
    );
    let mut store = ApplicantStore::new();
    AdmissionsImporter::new(&tenant(), sink)
        .absorb_snapshot(
            &mut store,
            SnapshotReader::from_reader(Cursor::new(data)).expect("header parses"),
        )
        .expect("snapshot absorbs");
    store
}

fn subject_line(unit_code: &str, level: &str, unit_type: char, name: &str) -> String {
    format!(
        "O5{unit_code:<6}{unit_code:<6}{level:<7}{unit_type}{pad:<20}{name:<36}{gap:<31}{ums:<4}",
        pad = "",
        gap = "",
        ums = "0"
    )
}

fn result_line(uci: &str, unit_code: &str, grade: &str) -> String {
    format!(
        "R567890{exam:<4}{uci:<13}{uln:<10}{gap:<6}{unit_code:<6}1{grade:<2}",
        exam = "0042",
        uln = "1234567890",
        gap = ""
    )
}

fn write_exam_feeds(dir: &Path) {
    let basedata = [
        "O1 AQA BASEDATA HEADER".to_string(),
        subject_line("7357", "GCE A", '1', "Mathematics"),
        subject_line("7408", "GCE A", '1', "Physics"),
        subject_line("7402", "GCE A", '1', "Biology"),
        subject_line("8300", "GCSE", '1', "Mathematics GCSE"),
    ]
    .join("\n");
    fs::write(dir.join("O0001.X71"), basedata).expect("basedata written");

    let results = [
        "R1 AQA RESULTS HEADER".to_string(),
        result_line(SMITH_UCI, "7357", "A"),
        result_line(SMITH_UCI, "7408", "B"),
        result_line(SMITH_UCI, "7402", "B"),
    ]
    .join("\n");
    fs::write(dir.join("R0001.X71"), results).expect("first results written");

    let later = [
        result_line(SMITH_UCI, "7357", "C"),
        result_line(JONES_UCI, "7357", "A*"),
        result_line(JONES_UCI, "7408", "A"),
        result_line(JONES_UCI, "7402", "A"),
        result_line("999999999999Z", "7357", "A"),
        result_line(JONES_UCI, "8300", "4"),
    ]
    .join("\n");
    fs::write(dir.join("r0002.x72"), later).expect("second results written");
    fs::write(dir.join("R0003.txt"), "ignored").expect("decoy written");
}

fn no_lines() -> Vec<Result<String, FeedError>> {
    Vec::new()
}

fn attach_identifiers(store: &mut ApplicantStore, sink: &CollectingSink) {
    let extract = format!(
        "Legal Surname,Legal Forename,DOB,Postcode,UPN,UCI,Y13\n\
         Smith,Jane,14 March 2006,LS1 4AB,A123456789012,{SMITH_UCI},Year 13\n\
         Jones,Ben,2 January 2006,YO1 7HH,B123456789012,{JONES_UCI},Year 13\n\
         Nobody,Here,1 April 2005,ZZ1 1ZZ,,,Year 12\n"
    );
    let records = read_identity_records(extract.as_bytes()).expect("extract parses");
    let updated = AdmissionsImporter::new(&tenant(), sink)
        .import_identities(store, &records)
        .expect("identities import");
    assert_eq!(updated, 2);
}

#[test]
fn results_need_basedata_and_applicants() {
    let sink = CollectingSink::new();
    let importer = AdmissionsImporter::new(&tenant(), &sink);
    let mut store = snapshot_store(&sink);

    let error = importer
        .import_results(&mut store, &SubjectCatalog::new(), no_lines())
        .expect_err("basedata required");
    assert!(matches!(error, ImportError::NoBasedata));

    let mut catalog = SubjectCatalog::new();
    importer
        .import_basedata(&mut catalog, vec![Ok(subject_line("7357", "GCE A", '1', "Maths"))])
        .expect("basedata imports");
    let error = importer
        .import_results(&mut ApplicantStore::new(), &catalog, no_lines())
        .expect_err("applicants required");
    assert!(matches!(error, ImportError::NoApplicants));
}

#[test]
fn exam_feeds_flow_through_to_destinations() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_exam_feeds(dir.path());

    let sink = CollectingSink::new();
    let importer = AdmissionsImporter::new(&tenant(), &sink);
    let mut store = snapshot_store(&sink);
    attach_identifiers(&mut store, &sink);
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::IdentityNotFound { .. })),
        1
    );

    let mut catalog = SubjectCatalog::new();
    let basedata = FeedLines::new(exam_files(dir.path(), 'O').expect("exam dir readable"));
    assert_eq!(
        importer
            .import_basedata(&mut catalog, basedata)
            .expect("basedata imports"),
        3
    );
    assert!(catalog.by_unit_code("8300").is_none(), "GCSE units are dropped");

    let results = exam_files(dir.path(), 'R').expect("exam dir readable");
    assert_eq!(results.len(), 2, "only .X files count as results");
    let added = importer
        .import_results(&mut store, &catalog, FeedLines::new(results))
        .expect("results import");
    assert_eq!(added, 6);

    let smith = store
        .applicant(store.by_uci(SMITH_UCI).expect("Smith has a UCI"))
        .expect("Smith tracked");
    assert_eq!(
        smith.result("7357").and_then(|result| result.grade()),
        Some("A"),
        "the first result for a unit is kept"
    );
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::DuplicateResult { .. })),
        1
    );
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::UnknownSubject { .. })),
        1
    );
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::IdentityNotFound { .. })),
        2
    );

    let report = destinations(&store).expect("snapshot loaded");
    let by_name = |name: &str| {
        report
            .entries
            .iter()
            .find(|entry| entry.applicant == name)
            .expect("applicant reported")
    };

    let smith = by_name("SMITH Jane");
    assert_eq!(smith.achieved, "ABB");
    assert_eq!(smith.destination, Destination::Insurance);
    assert_eq!(
        smith.firm.as_ref().map(|firm| firm.comparison),
        Some(GradeComparison::Below2Plus)
    );
    assert_eq!(smith.current_cohort, Some(true));

    let jones = by_name("JONES Ben");
    assert_eq!(jones.achieved, "A*AA");
    assert_eq!(jones.destination, Destination::Firm);
    assert!(jones.insurance.is_none());

    let risks = at_risk(&store).expect("snapshot loaded");
    assert_eq!(risks.basis, RiskBasis::Results);
    assert!(
        risks.entries.is_empty(),
        "Smith holds the insurance offer and Jones met the firm offer"
    );
}

#[test]
fn predictions_are_compared_with_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_exam_feeds(dir.path());

    let sink = CollectingSink::new();
    let importer = AdmissionsImporter::new(&tenant(), &sink);
    let mut store = snapshot_store(&sink);
    attach_identifiers(&mut store, &sink);

    let marksheet = "UPN,KS5 Ma UCAS Grade,KS5 Ph UCAS Grade,KS5 Bi UCAS Grade,Form\n\
                     A123456789012,a,A,b,13X\n\
                     B123456789012,A*,A,Q,13Y\n";
    let pattern = HeadingPattern::parse("KS5 % UCAS Grade").expect("valid pattern");
    let rows = read_prediction_rows(marksheet.as_bytes(), &pattern).expect("marksheet parses");
    let changed = importer
        .import_predictions(&mut store, &rows)
        .expect("predictions import");
    assert_eq!(changed, 5);
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::IgnoredPrediction { .. })),
        1
    );

    let entry_for = |store: &ApplicantStore, name: &str| {
        destinations(store)
            .expect("snapshot loaded")
            .entries
            .into_iter()
            .find(|entry| entry.applicant == name)
            .expect("applicant reported")
    };

    // No results held yet, so no grade position is checked.
    let smith = entry_for(&store, "SMITH Jane");
    assert_eq!(smith.predicted, "AAB");
    assert_eq!(smith.achieved, "");
    assert_eq!(smith.achieved_vs_predicted, GradeComparison::Met);

    let risks = at_risk(&store).expect("snapshot loaded");
    assert_eq!(risks.basis, RiskBasis::Predictions);
    let risk_of = |name: &str| {
        risks
            .entries
            .iter()
            .find(|entry| entry.applicant == name)
            .map(|entry| entry.risk)
    };
    assert_eq!(risk_of("SMITH Jane"), Some(RiskLevel::Low));
    assert_eq!(risk_of("JONES Ben"), Some(RiskLevel::High));

    let mut catalog = SubjectCatalog::new();
    importer
        .import_basedata(
            &mut catalog,
            FeedLines::new(exam_files(dir.path(), 'O').expect("exam dir readable")),
        )
        .expect("basedata imports");
    importer
        .import_results(
            &mut store,
            &catalog,
            FeedLines::new(exam_files(dir.path(), 'R').expect("exam dir readable")),
        )
        .expect("results import");

    let smith = entry_for(&store, "SMITH Jane");
    assert_eq!(smith.achieved, "ABB");
    assert_eq!(smith.achieved_vs_predicted, GradeComparison::Below1);

    let jones = entry_for(&store, "JONES Ben");
    assert_eq!(jones.predicted, "A*A");
    assert_eq!(
        jones.achieved_vs_predicted,
        GradeComparison::Met,
        "predictions are compared without the under-checked warning"
    );

    let summary = applicant_summary(&store, &sink).expect("snapshot loaded");
    assert!(summary
        .entries
        .iter()
        .all(|entry| entry.status == ApplicantStatus::ChoicesMade));
    assert_eq!(
        sink.count(|issue| matches!(issue, DataQualityIssue::MissingInsurance { .. })),
        1,
        "Jones holds a conditional firm with no insurance"
    );
}
