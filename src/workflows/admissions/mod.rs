pub mod comparator;
pub mod datastore;
mod diff;
pub mod domain;
mod identity;
mod importer;
pub mod offer;
pub mod quality;
pub mod report;
mod store;
pub mod subjects;
pub mod validation;

pub use comparator::{compare, GradeComparison};
pub use datastore::{Datastore, DatastoreError};
pub use diff::{classify_update, ChoiceDiffEngine};
pub use domain::{Applicant, Choice, ChoiceId, ChoiceUpdate, ExamResult, Outcome};
pub use identity::IdentityResolver;
pub use importer::{AdmissionsImporter, ImportError, SnapshotOutcome};
pub use offer::Offer;
pub use quality::{CollectingSink, DataQualityIssue, DataQualitySink, TracingSink};
pub use store::{ApplicantStore, StudentInsert};
pub use subjects::{Subject, SubjectCatalog};
