use super::{fixed_field, ExamLine};
use crate::workflows::admissions::subjects::{is_known_unit_type, Subject, KNOWN_LEVELS};
use tracing::debug;

const UNIT_LINE: &str = "O5";

/// Reads one basedata line. `O5` lines define a unit; anything else is a header.
pub fn parse_subject_line(line: &str) -> ExamLine<Subject> {
    if !line.starts_with(UNIT_LINE) {
        return ExamLine::Header;
    }

    let Some(unit_type) = fixed_field(line, 21, 22).chars().next() else {
        return ExamLine::Malformed(line.to_string());
    };

    let qualification_level = fixed_field(line, 14, 21).trim_end().to_string();
    if qualification_level.is_empty() || !KNOWN_LEVELS.contains(&qualification_level.as_str()) {
        debug!(level = %qualification_level, "subject has unrecognised qualification level");
    }
    if !is_known_unit_type(unit_type) {
        debug!(unit_type = %unit_type, "subject has unrecognised unit type");
    }

    let ums_text = fixed_field(line, 109, 113).trim();
    let max_ums = if ums_text.is_empty() {
        0
    } else {
        ums_text.parse().unwrap_or_else(|_| {
            debug!(value = %ums_text, "ignoring invalid max UMS value");
            0
        })
    };

    ExamLine::Record(Subject {
        unit_code: fixed_field(line, 2, 8).trim_end().to_string(),
        spec_code: fixed_field(line, 8, 14).trim_end().to_string(),
        qualification_level,
        unit_type,
        name: fixed_field(line, 42, 78).trim_end().to_string(),
        max_ums,
        sims_name: None,
    })
}

#[cfg(test)]
pub(crate) fn subject_line_for_tests(
    unit_code: &str,
    level: &str,
    unit_type: char,
    name: &str,
    max_ums: &str,
) -> String {
    format!(
        "O5{unit_code:<6}{spec:<6}{level:<7}{unit_type}{pad:<20}{name:<36}{gap:<31}{max_ums:<4}",
        spec = unit_code,
        pad = "",
        gap = "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_unit_definition() {
        let line = subject_line_for_tests("7357", "GCE A", 'C', "AQA Mathematics", "300");
        match parse_subject_line(&line) {
            ExamLine::Record(subject) => {
                assert_eq!(subject.unit_code, "7357");
                assert_eq!(subject.spec_code, "7357");
                assert_eq!(subject.qualification_level, "GCE A");
                assert_eq!(subject.unit_type, 'C');
                assert_eq!(subject.name, "AQA Mathematics");
                assert_eq!(subject.max_ums, 300);
                assert!(subject.is_alevel());
            }
            other => panic!("expected subject, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_max_ums_defaults_to_zero() {
        let line = subject_line_for_tests("PHYA1", "GCE ASB", 'U', "Physics Unit 1", "x9");
        match parse_subject_line(&line) {
            ExamLine::Record(subject) => {
                assert_eq!(subject.max_ums, 0);
                assert!(!subject.is_alevel());
            }
            other => panic!("expected subject, got {other:?}"),
        }
    }

    #[test]
    fn short_line_still_yields_subject() {
        match parse_subject_line("O57357  7357  GCE A  C") {
            ExamLine::Record(subject) => {
                assert_eq!(subject.unit_code, "7357");
                assert_eq!(subject.name, "");
                assert_eq!(subject.max_ums, 0);
            }
            other => panic!("expected subject, got {other:?}"),
        }
    }

    #[test]
    fn other_lines_are_headers() {
        assert_eq!(parse_subject_line("O1 header"), ExamLine::Header);
        assert!(matches!(parse_subject_line("O5ABC"), ExamLine::Malformed(_)));
    }
}
