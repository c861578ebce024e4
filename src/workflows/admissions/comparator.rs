use super::offer::{grade_rank, Offer};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classification of achieved grades against a required offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeComparison {
    Met,
    Above1,
    Above2Plus,
    Below1,
    Below2Plus,
    Up1Dn1,
    Mixed,
    Check,
    NoOffer,
}

use GradeComparison::{Above1, Above2Plus, Below1, Below2Plus, Met, Mixed, Up1Dn1};

/// Rows follow the state order Met..Mixed; columns are the capped difference -2..=2.
const TRANSITIONS: [[GradeComparison; 5]; 7] = [
    [Below2Plus, Below1, Met, Above1, Above2Plus],
    [Mixed, Up1Dn1, Above1, Above2Plus, Above2Plus],
    [Mixed, Mixed, Above2Plus, Above2Plus, Above2Plus],
    [Below2Plus, Below2Plus, Below1, Up1Dn1, Mixed],
    [Below2Plus, Below2Plus, Below2Plus, Mixed, Mixed],
    [Mixed, Mixed, Up1Dn1, Mixed, Mixed],
    [Mixed, Mixed, Mixed, Mixed, Mixed],
];

impl GradeComparison {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Met => "Met",
            Self::Above1 => "Above 1",
            Self::Above2Plus => "Above 2+",
            Self::Below1 => "Below 1",
            Self::Below2Plus => "Below 2+",
            Self::Up1Dn1 => "Up1Dn1",
            Self::Mixed => "Mixed",
            Self::Check => "CHECK",
            Self::NoOffer => "No Offer",
        }
    }

    pub const fn is_met(self) -> bool {
        matches!(self, Self::Met | Self::Above1 | Self::Above2Plus)
    }

    pub const fn is_unmet(self) -> bool {
        matches!(
            self,
            Self::Below1 | Self::Below2Plus | Self::Up1Dn1 | Self::Mixed
        )
    }

    fn row(self) -> Option<usize> {
        match self {
            Self::Met => Some(0),
            Self::Above1 => Some(1),
            Self::Above2Plus => Some(2),
            Self::Below1 => Some(3),
            Self::Below2Plus => Some(4),
            Self::Up1Dn1 => Some(5),
            Self::Mixed => Some(6),
            Self::Check | Self::NoOffer => None,
        }
    }

    /// Next state after one grade position whose capped difference is `step` (-2..=2).
    fn advance(self, step: i8) -> Self {
        match self.row() {
            Some(row) => TRANSITIONS[row][(step.clamp(-2, 2) + 2) as usize],
            None => self,
        }
    }
}

/// Compares `achieved` grades against the `required` offer slot by slot.
///
/// Special-condition offers and unrecognised grade letters yield [`GradeComparison::Check`].
/// An up-one/down-one result against a points offer counts as met, since the tariff total
/// is unchanged. With `warn_on_underchecked`, an apparently met result is downgraded to
/// `Check` when the offer asks for more grades than were achieved.
pub fn compare(achieved: &Offer, required: &Offer, warn_on_underchecked: bool) -> GradeComparison {
    if required.is_special_condition() {
        return GradeComparison::Check;
    }

    let got = achieved.grade_slots();
    let wanted = required.grade_slots();

    let mut state = GradeComparison::Met;
    for (position, (got_letter, wanted_letter)) in got.iter().zip(wanted.iter()).enumerate() {
        let (Some(got_rank), Some(wanted_rank)) = (grade_rank(*got_letter), grade_rank(*wanted_letter))
        else {
            debug!(
                position,
                achieved = %achieved.grades(),
                required = %required.grades(),
                "unrecognised grade in comparison"
            );
            return GradeComparison::Check;
        };

        let difference = got_rank as i8 - wanted_rank as i8;
        let step = difference.signum() * difference.abs().min(2);
        state = state.advance(step);
        if state == GradeComparison::Up1Dn1 && required.is_points_offer() {
            state = GradeComparison::Met;
        }
    }

    debug!(
        achieved = %achieved.grade_equivalent(),
        required = %required.grade_equivalent(),
        outcome = state.label(),
        "compared grades"
    );

    if warn_on_underchecked && state.is_met() && wanted.len() > got.len() {
        return GradeComparison::Check;
    }

    state
}
