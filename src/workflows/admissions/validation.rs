use serde::{Deserialize, Serialize};

/// Secondary identifiers an applicant may carry alongside the admissions-service id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Unique pupil number from the student information system.
    Upn,
    /// Unique learner number.
    Uln,
    /// Unique candidate identifier from the exam board.
    Uci,
    ExamNumber,
}

impl IdentifierKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upn => "UPN",
            Self::Uln => "ULN",
            Self::Uci => "UCI",
            Self::ExamNumber => "exam number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} '{value}' is not well formed", .kind.label())]
pub struct InvalidIdentifier {
    pub kind: IdentifierKind,
    pub value: String,
}

const TWELVE_DIGITS: std::ops::Range<u64> = 100_000_000_000..1_000_000_000_000;
const TEN_DIGITS: std::ops::Range<u64> = 1_000_000_000..10_000_000_000;

/// Shape check for a secondary identifier.
///
/// UPNs lead with an uppercase letter and UCIs end with one; both carry twelve digits.
/// ULNs are ten digits and exam numbers run from 0 to 9999.
pub fn validate(kind: IdentifierKind, value: &str) -> Result<(), InvalidIdentifier> {
    let valid = match kind {
        IdentifierKind::Uln => value
            .parse::<u64>()
            .map(|number| TEN_DIGITS.contains(&number))
            .unwrap_or(false),
        IdentifierKind::ExamNumber => value
            .parse::<u64>()
            .map(|number| number <= 9999)
            .unwrap_or(false),
        IdentifierKind::Upn => {
            let mut chars = value.chars();
            let check = chars.next();
            checked_body(check, chars.as_str())
        }
        IdentifierKind::Uci => {
            let mut chars = value.chars();
            let check = chars.next_back();
            checked_body(check, chars.as_str())
        }
    };

    if valid {
        Ok(())
    } else {
        Err(InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

fn checked_body(check: Option<char>, body: &str) -> bool {
    let Some(check) = check else {
        return false;
    };
    check.is_ascii_uppercase()
        && body.chars().all(|c| c.is_ascii_digit())
        && body
            .parse::<u64>()
            .map(|number| TWELVE_DIGITS.contains(&number))
            .unwrap_or(false)
}
