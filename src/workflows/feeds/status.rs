use super::FeedError;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Date-of-birth format used by the status snapshot, e.g. `02-DEC-99`.
pub const DOB_FORMAT: &str = "%d-%b-%y";
const HEADER_DATE_FORMAT: &str = "%d/%m/%Y";
const HEADER_DATE_COLUMNS: Range<usize> = 42..52;
const SERVICE_ID_RANGE: Range<u64> = 1_000_000_000..10_000_000_000;
const ENTRY_YEARS: Range<i32> = 2001..2100;

/// Applicant line of a status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub surname: String,
    pub forenames: String,
    pub date_of_birth: NaiveDate,
    pub cycle_service_id: String,
    pub cycle: String,
    pub postcode: String,
}

/// Choice line of a status snapshot; belongs to the most recent applicant line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRecord {
    pub sequence: u32,
    pub institution_code: String,
    pub institution: String,
    pub course_code: String,
    pub outcome_code: String,
    pub offer: String,
    pub course: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLine {
    Student(StudentRecord),
    Choice(ChoiceRecord),
    Unrecognized(String),
}

fn snapshot_csv<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Fields of one snapshot record. A separator inside a quoted field becomes a space.
pub fn record_fields(record: &csv::StringRecord) -> Vec<String> {
    record.iter().map(|field| field.replace(',', " ")).collect()
}

/// Classifies an already-split data line.
///
/// Applicant lines carry a date of birth in field 2 and a ten digit service id in field 3.
/// Choice lines carry an integer sequence number in field 0 and an entry year in field 8.
pub fn classify(fields: &[String]) -> SnapshotLine {
    if let Some(student) = student_record(fields) {
        return SnapshotLine::Student(student);
    }
    if let Some(choice) = choice_record(fields) {
        return SnapshotLine::Choice(choice);
    }
    SnapshotLine::Unrecognized(fields.join(","))
}

fn field(fields: &[String], index: usize) -> String {
    fields.get(index).cloned().unwrap_or_default()
}

fn student_record(fields: &[String]) -> Option<StudentRecord> {
    let date_of_birth = NaiveDate::parse_from_str(fields.get(2)?, DOB_FORMAT).ok()?;
    let service_id = fields.get(3)?.parse::<u64>().ok()?;
    if !SERVICE_ID_RANGE.contains(&service_id) {
        return None;
    }

    Some(StudentRecord {
        surname: field(fields, 0),
        forenames: field(fields, 1),
        date_of_birth,
        cycle_service_id: field(fields, 3),
        cycle: field(fields, 4),
        postcode: field(fields, 9),
    })
}

fn choice_record(fields: &[String]) -> Option<ChoiceRecord> {
    let sequence = fields.first()?.parse::<u32>().ok()?;
    let entry_year = fields.get(8)?.parse::<i32>().ok()?;
    if !ENTRY_YEARS.contains(&entry_year) {
        return None;
    }

    Some(ChoiceRecord {
        sequence,
        institution_code: field(fields, 1),
        institution: field(fields, 2),
        course_code: field(fields, 3),
        outcome_code: field(fields, 5),
        offer: field(fields, 6),
        course: field(fields, 7),
    })
}

fn parse_header_date(fields: &[String]) -> Result<NaiveDate, FeedError> {
    let first = fields
        .first()
        .map(|field| field.trim_start_matches('\u{feff}'))
        .unwrap_or_default();
    let text = first
        .get(HEADER_DATE_COLUMNS)
        .ok_or_else(|| FeedError::MalformedHeader(format!("no file date in '{first}'")))?;
    NaiveDate::parse_from_str(text, HEADER_DATE_FORMAT)
        .map_err(|_| FeedError::MalformedHeader(format!("unreadable file date '{text}'")))
}

/// One dated status snapshot, read lazily record by record.
pub struct SnapshotReader<R> {
    date: NaiveDate,
    establishment: String,
    records: csv::StringRecordsIntoIter<R>,
}

impl SnapshotReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FeedError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> SnapshotReader<R> {
    /// Reads the two header records: the file date, then the establishment number.
    pub fn from_reader(reader: R) -> Result<Self, FeedError> {
        let mut records = snapshot_csv(reader).into_records();

        let header = records
            .next()
            .transpose()?
            .ok_or_else(|| FeedError::MalformedHeader("empty snapshot".to_string()))?;
        let date = parse_header_date(&record_fields(&header))?;

        let establishment = records
            .next()
            .transpose()?
            .ok_or_else(|| FeedError::MalformedHeader("missing establishment line".to_string()))?
            .get(0)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            date,
            establishment,
            records,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn establishment(&self) -> &str {
        &self.establishment
    }
}

impl<R: Read> Iterator for SnapshotReader<R> {
    type Item = Result<SnapshotLine, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err.into())),
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            return Some(Ok(classify(&record_fields(&record))));
        }
    }
}

/// A snapshot file found on disk, with the date read from its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub date: NaiveDate,
}

/// Lists `.csv` files in `dir` whose name contains `prefix`, oldest snapshot first.
/// Files that cannot be opened or carry no readable date are skipped.
pub fn discover_snapshots(dir: &Path, prefix: &str) -> Result<Vec<SnapshotFile>, FeedError> {
    let entries = std::fs::read_dir(dir).map_err(|source| FeedError::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !path.is_file() || !is_csv || !name.contains(prefix) {
            continue;
        }

        match SnapshotReader::open(&path) {
            Ok(reader) => found.push(SnapshotFile {
                date: reader.date(),
                path,
            }),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping candidate snapshot"),
        }
    }

    found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(found)
}
