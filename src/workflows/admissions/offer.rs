use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trailing condition codes that are not A-level grades (GCSE, STEP, interviews and the like).
pub const NON_ALEVEL_CODES: &str = "+XKFGHLTJNM";

/// Non-academic codes; an offer consisting only of these is effectively unconditional.
/// `+`, `X` and `K` are academic requirements and deliberately absent.
pub const IGNORABLE_CODES: &str = "FGHLTJNM";

/// Value given to offers whose conditions cannot be evaluated from grades. Larger than any
/// attainable grade total, so such offers always compare as unmet.
pub const SPECIAL_CONDITIONS_VALUE: u32 = 1000;

/// Single-character stand-in for `A*` so every grade occupies one slot.
pub(crate) const A_STAR: char = '@';

const GRADE_LADDER: [char; 6] = ['E', 'D', 'C', 'B', 'A', A_STAR];
const TOP_RANK: u8 = 5;
const SLOTS: usize = 3;

/// Rank of a grade letter on the E..A* ladder (E = 0, A* = 5).
pub fn grade_rank(letter: char) -> Option<u8> {
    GRADE_LADDER
        .iter()
        .position(|grade| *grade == letter)
        .map(|rank| rank as u8)
}

/// 2017 tariff points for a rank: E = 16 up to A* = 56.
pub const fn rank_points(rank: u8) -> u32 {
    rank as u32 * 8 + 16
}

fn grade_letter(rank: u8) -> char {
    GRADE_LADDER[usize::from(rank.min(TOP_RANK))]
}

fn expand_a_star(encoded: &str) -> String {
    encoded.replace(A_STAR, "A*")
}

fn is_numeric(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit())
}

/// One academic condition string in canonical, comparable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offer {
    raw: String,
    key: String,
}

impl Offer {
    /// Canonicalizes raw offer text. Whitespace is removed, `@` is read as `A*`, trailing
    /// non-A-level codes are dropped from the key, and grade keys are sorted so that
    /// `BAC` and `ACB` are the same offer.
    pub fn normalize(raw_text: &str) -> Self {
        let raw: String = raw_text.replace('@', "A*").split_whitespace().collect();

        let stripped = raw.trim_end_matches(|c: char| NON_ALEVEL_CODES.contains(c));
        let encoded = stripped.replace("A*", &A_STAR.to_string());

        let key = if is_numeric(&encoded) {
            encoded
        } else {
            let mut letters: Vec<char> = encoded.chars().collect();
            letters.sort_unstable();
            letters.into_iter().collect()
        };

        Self { raw, key }
    }

    /// An offer with no conditions at all.
    pub fn empty() -> Self {
        Self::normalize("")
    }

    /// Whitespace-free text with `A*` spelled out, as the institution wrote it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Canonical key; `A*` is held as a single placeholder character.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Canonical key with `A*` spelled out.
    pub fn grades(&self) -> String {
        expand_a_star(&self.key)
    }

    pub fn num_grades(&self) -> usize {
        self.key.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Tariff points of a numeric offer; `None` for grade offers and for numbers too large
    /// to be a tariff.
    pub fn points(&self) -> Option<u32> {
        if !is_numeric(&self.key) {
            return None;
        }
        self.key.parse::<u32>().ok()
    }

    pub fn is_points_offer(&self) -> bool {
        self.points().is_some()
    }

    /// No grade conditions, but something other than ignorable codes remains. A numeric
    /// offer beyond any tariff is also special.
    pub fn is_special_condition(&self) -> bool {
        if is_numeric(&self.key) {
            return self.points().is_none();
        }
        self.key.is_empty() && self.raw.chars().any(|c| !IGNORABLE_CODES.contains(c))
    }

    /// Tariff value of the offer. Unconditional offers are worth 0 and special-condition
    /// offers are worth [`SPECIAL_CONDITIONS_VALUE`].
    pub fn grade_value(&self) -> u32 {
        if let Some(points) = self.points() {
            return points;
        }
        if self.is_special_condition() {
            return SPECIAL_CONDITIONS_VALUE;
        }
        if self.key.is_empty() {
            return 0;
        }

        self.key
            .chars()
            .filter_map(|letter| match grade_rank(letter) {
                Some(rank) => Some(rank_points(rank)),
                None => {
                    debug!(grade = %letter, offer = %self.raw, "grade not recognised, ignoring");
                    None
                }
            })
            .sum()
    }

    /// Grade letters in placeholder form, one slot per grade. Points offers are converted
    /// to their reference grade triple first.
    pub(crate) fn grade_slots(&self) -> Vec<char> {
        match self.points() {
            Some(target) => minimal_triple(target)
                .iter()
                .map(|rank| grade_letter(*rank))
                .collect(),
            None => self.key.chars().collect(),
        }
    }

    /// Grade letters for the offer with `A*` spelled out; points offers yield the
    /// reference triple from [`Offer::grade_slots`].
    pub fn grade_equivalent(&self) -> String {
        expand_a_star(&self.grade_slots().into_iter().collect::<String>())
    }
}

/// Greedy descent from three A* grades: the highest slot (lowest index on ties) drops one
/// grade at a time until the total fits within `target`. Stops at three Es.
fn minimal_triple(target: u32) -> [u8; SLOTS] {
    let mut trial = [TOP_RANK; SLOTS];
    let total = |trial: &[u8; SLOTS]| trial.iter().map(|rank| rank_points(*rank)).sum::<u32>();

    while total(&trial) > target {
        let highest = trial.iter().copied().max().unwrap_or(0);
        if highest == 0 {
            break;
        }
        if let Some(slot) = trial.iter().position(|rank| *rank == highest) {
            trial[slot] -= 1;
        }
    }

    trial
}

impl Default for Offer {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for Offer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
