use super::{fixed_field, ExamLine};
use crate::workflows::admissions::domain::{CandidateIds, ExamResult, ResultEntry};
use crate::workflows::admissions::subjects::{
    GRADE_ONLY_TYPES, MARK_AND_GRADE_TYPES, MARK_ONLY_TYPES,
};

const RESULT_LINE: &str = "R5";
const PAYLOAD_START: usize = 40;

/// Reads one results line. `R5` lines carry a unit result; anything else is a header.
pub fn parse_result_line(line: &str) -> ExamLine<ExamResult> {
    if !line.starts_with(RESULT_LINE) {
        return ExamLine::Header;
    }

    let candidate = CandidateIds {
        exam_number: fixed_field(line, 7, 11).trim().to_string(),
        uci: fixed_field(line, 11, 24).trim().to_string(),
        uln: fixed_field(line, 24, 34).trim().to_string(),
    };
    let payload = fixed_field(line, PAYLOAD_START, line.len());

    match result_entry(payload) {
        Some(entry) => ExamLine::Record(ExamResult {
            unit_code: fixed_field(payload, 0, 6).trim_end().to_string(),
            candidate,
            entry,
        }),
        None => ExamLine::Malformed(line.to_string()),
    }
}

/// Centre number on a results line, used to confirm the file belongs to this centre.
pub fn centre_number(line: &str) -> Option<&str> {
    line.starts_with(RESULT_LINE)
        .then(|| fixed_field(line, 2, 7).trim())
}

fn result_entry(payload: &str) -> Option<ResultEntry> {
    let unit_type = fixed_field(payload, 6, 7).chars().next()?;
    let text = |start, end| fixed_field(payload, start, end).trim().to_string();

    if GRADE_ONLY_TYPES.contains(unit_type) {
        Some(ResultEntry::GradeOnly { grade: text(7, 9) })
    } else if MARK_AND_GRADE_TYPES.contains(unit_type) {
        Some(ResultEntry::MarkAndGrade {
            mark: text(7, 11).parse().ok()?,
            grade: text(11, 13),
        })
    } else if MARK_ONLY_TYPES.contains(unit_type) {
        Some(ResultEntry::MarkOnly {
            mark: text(7, 10).parse().ok()?,
            grade: text(10, 12),
        })
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) fn result_line_for_tests(uci: &str, exam_number: &str, payload: &str) -> String {
    format!("R567890{exam_number:<4}{uci:<13}{uln:<10}{gap:<6}{payload}", uln = "1234567890", gap = "")
}
