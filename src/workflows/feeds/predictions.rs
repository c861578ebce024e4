use super::FeedError;
use std::io::Read;

const VALID_GRADES: [&str; 6] = ["A*", "A", "B", "C", "D", "E"];

/// Grades from one marksheet row, keyed by the subject name found in the heading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionRow {
    pub upn: Option<String>,
    pub grades: Vec<(String, String)>,
    /// Non-blank cells that are not a valid predicted grade, as (subject, cell).
    pub rejected: Vec<(String, String)>,
}

/// Heading template such as `KS5 % UCAS Grade`; `%` marks the subject name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingPattern {
    preamble: String,
    postamble: String,
}

impl HeadingPattern {
    /// Returns `None` unless the template contains exactly one `%`.
    pub fn parse(template: &str) -> Option<Self> {
        let lowered = template.to_lowercase();
        let (preamble, postamble) = lowered.split_once('%')?;
        if postamble.contains('%') {
            return None;
        }
        Some(Self {
            preamble: preamble.to_string(),
            postamble: postamble.to_string(),
        })
    }

    /// Subject name for a matching heading, capitalized.
    pub fn subject(&self, heading: &str) -> Option<String> {
        let lowered = heading.trim().to_lowercase();
        let inner = lowered
            .strip_prefix(&self.preamble)?
            .strip_suffix(&self.postamble)?
            .trim();
        if inner.is_empty() {
            return None;
        }
        let mut chars = inner.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
    }
}

pub fn read_prediction_rows<R: Read>(
    reader: R,
    pattern: &HeadingPattern,
) -> Result<Vec<PredictionRow>, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headings: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let upn_column = headings
        .iter()
        .position(|heading| heading.eq_ignore_ascii_case("upn"))
        .ok_or_else(|| FeedError::MalformedHeader("marksheet has no UPN column".to_string()))?;
    let subjects: Vec<(usize, String)> = headings
        .iter()
        .enumerate()
        .filter_map(|(index, heading)| pattern.subject(heading).map(|subject| (index, subject)))
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut row = PredictionRow {
            upn: record
                .get(upn_column)
                .filter(|upn| !upn.is_empty())
                .map(str::to_string),
            ..PredictionRow::default()
        };

        for (index, subject) in &subjects {
            let Some(cell) = record.get(*index).filter(|cell| !cell.is_empty()) else {
                continue;
            };
            let grade = cell.to_uppercase();
            if VALID_GRADES.contains(&grade.as_str()) {
                row.grades.push((subject.clone(), grade));
            } else {
                row.rejected.push((subject.clone(), cell.to_string()));
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
