mod at_risk;
mod destinations;
mod offers;
mod summary;

pub use at_risk::{at_risk, AtRiskEntry, AtRiskReport, HeldChoiceView, RiskBasis, RiskLevel};
pub use destinations::{
    destinations, AcceptedChoiceView, Destination, DestinationEntry, DestinationTotal,
    DestinationsReport,
};
pub use offers::{offers, OfferRow, OffersReport, OffersScope, NEW_APPLICANT_LABEL};
pub use summary::{applicant_summary, ApplicantStatus, ApplicantSummaryEntry, SummaryReport};
