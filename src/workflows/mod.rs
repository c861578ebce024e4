pub mod admissions;
pub mod feeds;
