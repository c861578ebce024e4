use super::FeedError;
use chrono::NaiveDate;
use std::io::Read;
use tracing::debug;

const DOB_FORMAT: &str = "%d %B %Y";
const SURNAME_HEADINGS: [&str; 3] = ["LEGAL SURNAME", "LSURNAME", "SURNAME"];
const FORENAME_HEADINGS: [&str; 3] = ["LEGAL FORENAME", "LFORENAME", "FORENAME"];
const CURRENT_COHORT: &str = "Year 13";

/// Identity fields from one row of a student information system extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    pub surname: Option<String>,
    pub forename: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub postcode: Option<String>,
    pub upn: Option<String>,
    pub uln: Option<String>,
    pub uci: Option<String>,
    pub exam_number: Option<String>,
    /// `Some(true)` when the year column reads `Year 13`.
    pub current_cohort: Option<bool>,
}

/// Canonical heading name after upper-casing and aliasing.
fn canonical_heading(raw: &str) -> String {
    let heading = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .to_uppercase();
    match heading.as_str() {
        "DOB" | "DATE OF BIRTH" => "DOB".to_string(),
        "EXAM NUMBER" | "EXAMNO" | "EXAM NO" => "EXAMNO".to_string(),
        "POSTCODE" | "PCODE" => "POSTCODE".to_string(),
        _ => heading,
    }
}

struct Columns {
    headings: Vec<String>,
}

impl Columns {
    fn position(&self, name: &str) -> Option<usize> {
        self.headings.iter().position(|heading| heading == name)
    }

    /// First heading of `names` that exists, in the order given.
    fn first_of(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| self.position(name))
    }
}

fn cell(row: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|index| row.get(index))
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

pub fn read_identity_records<R: Read>(reader: R) -> Result<Vec<IdentityRecord>, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns {
        headings: csv_reader
            .headers()?
            .iter()
            .map(canonical_heading)
            .collect(),
    };
    let surname = columns.first_of(&SURNAME_HEADINGS);
    let forename = columns.first_of(&FORENAME_HEADINGS);
    let dob = columns.position("DOB");
    let postcode = columns.position("POSTCODE");
    let upn = columns.position("UPN");
    let uln = columns.position("ULN");
    let uci = columns.position("UCI");
    let exam_number = columns.position("EXAMNO");
    let cohort = columns.position("Y13");

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let date_of_birth = cell(&row, dob).and_then(|text| {
            NaiveDate::parse_from_str(&text, DOB_FORMAT)
                .map_err(|err| debug!(value = %text, error = %err, "unreadable date of birth"))
                .ok()
        });

        records.push(IdentityRecord {
            surname: cell(&row, surname),
            forename: cell(&row, forename),
            date_of_birth,
            postcode: cell(&row, postcode),
            upn: cell(&row, upn),
            uln: cell(&row, uln),
            uci: cell(&row, uci),
            exam_number: cell(&row, exam_number),
            current_cohort: cohort.map(|_| cell(&row, cohort).as_deref() == Some(CURRENT_COHORT)),
        });
    }

    Ok(records)
}
