use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::domain::Applicant;
use super::store::ApplicantStore;
use super::subjects::{Subject, SubjectCatalog};

pub const APPLICANT_STORE_TOKEN: &str = "#!ADMISSIONS-DATA";
pub const SUBJECT_STORE_TOKEN: &str = "#!ADMISSIONS-BASE";
const APPLICANT_FILE_PREFIX: &str = "asrdata";
const SUBJECT_FILE: &str = "basedata.json";
const FILE_DATE_FORMAT: &str = "%d%m%Y";

#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("datastore {} could not be accessed: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("datastore is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a {expected} datastore (format token '{found}')")]
    BadStoreToken {
        expected: &'static str,
        found: String,
    },
    #[error("datastore was written for another establishment")]
    LicenseMismatch,
    #[error("no snapshot has been absorbed, nothing to save")]
    NoSnapshotDate,
}

#[derive(Serialize)]
struct ApplicantDocumentRef<'a> {
    format: &'a str,
    license: &'a str,
    dates: &'a [NaiveDate],
    applicants: &'a [Applicant],
}

#[derive(Deserialize)]
struct ApplicantDocument {
    dates: Vec<NaiveDate>,
    applicants: Vec<Applicant>,
}

#[derive(Serialize)]
struct SubjectDocumentRef<'a> {
    format: &'a str,
    license: &'a str,
    subjects: &'a [Subject],
}

#[derive(Deserialize)]
struct SubjectDocument {
    subjects: Vec<Subject>,
}

/// Checks the format and licence tokens of a parsed document, in that order.
fn verify(document: &Value, expected: &'static str, licence: &str) -> Result<(), DatastoreError> {
    let format = document.get("format").and_then(Value::as_str).unwrap_or_default();
    if format != expected {
        return Err(DatastoreError::BadStoreToken {
            expected,
            found: format.to_string(),
        });
    }
    match document.get("license").and_then(Value::as_str) {
        Some(token) if token == licence => Ok(()),
        _ => Err(DatastoreError::LicenseMismatch),
    }
}

pub fn write_applicants<W: Write>(
    writer: W,
    licence: &str,
    store: &ApplicantStore,
) -> Result<(), DatastoreError> {
    let document = ApplicantDocumentRef {
        format: APPLICANT_STORE_TOKEN,
        license: licence,
        dates: store.dates(),
        applicants: store.applicants(),
    };
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

pub fn read_applicants<R: Read>(reader: R, licence: &str) -> Result<ApplicantStore, DatastoreError> {
    let document: Value = serde_json::from_reader(reader)?;
    verify(&document, APPLICANT_STORE_TOKEN, licence)?;
    let ApplicantDocument { dates, applicants } = serde_json::from_value(document)?;
    Ok(ApplicantStore::from_parts(dates, applicants))
}

pub fn write_subjects<W: Write>(
    writer: W,
    licence: &str,
    catalog: &SubjectCatalog,
) -> Result<(), DatastoreError> {
    let document = SubjectDocumentRef {
        format: SUBJECT_STORE_TOKEN,
        license: licence,
        subjects: catalog.subjects(),
    };
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

pub fn read_subjects<R: Read>(reader: R, licence: &str) -> Result<SubjectCatalog, DatastoreError> {
    let document: Value = serde_json::from_reader(reader)?;
    verify(&document, SUBJECT_STORE_TOKEN, licence)?;
    let SubjectDocument { subjects } = serde_json::from_value(document)?;
    Ok(SubjectCatalog::from_subjects(subjects))
}

/// Datastore files for one licensed establishment under a data directory.
#[derive(Debug, Clone)]
pub struct Datastore {
    dir: PathBuf,
    licence: String,
}

impl Datastore {
    pub fn new(dir: impl Into<PathBuf>, licence: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            licence: licence.into(),
        }
    }

    pub fn applicant_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{APPLICANT_FILE_PREFIX}{}.json",
            date.format(FILE_DATE_FORMAT)
        ))
    }

    pub fn subject_path(&self) -> PathBuf {
        self.dir.join(SUBJECT_FILE)
    }

    /// Writes the store under its current snapshot date and returns the file written.
    pub fn save_applicants(&self, store: &ApplicantStore) -> Result<PathBuf, DatastoreError> {
        let date = store.current_date().ok_or(DatastoreError::NoSnapshotDate)?;
        let path = self.applicant_path(date);
        let mut writer = create(&self.dir, &path)?;
        write_applicants(&mut writer, &self.licence, store)?;
        writer.flush().map_err(|source| DatastoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), applicants = store.len(), "applicant data saved");
        Ok(path)
    }

    /// Loads the datastore whose current snapshot is the latest. Files with another format
    /// token are skipped; a file licensed to another establishment is fatal.
    pub fn load_applicants(&self) -> Result<Option<ApplicantStore>, DatastoreError> {
        let Some(entries) = read_dir(&self.dir)? else {
            return Ok(None);
        };

        let mut latest: Option<(NaiveDate, ApplicantStore)> = None;
        let mut all_dates: Vec<NaiveDate> = Vec::new();

        for path in entries {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !name.starts_with(APPLICANT_FILE_PREFIX) || !name.ends_with(".json") {
                continue;
            }

            let store = match read_applicants(open(&path)?, &self.licence) {
                Ok(store) => store,
                Err(DatastoreError::BadStoreToken { found, .. }) => {
                    debug!(path = %path.display(), token = %found, "skipping file without applicant token");
                    continue;
                }
                Err(err) => return Err(err),
            };
            all_dates.extend_from_slice(store.dates());

            let Some(current) = store.current_date() else {
                continue;
            };
            if latest.as_ref().map_or(true, |(date, _)| current > *date) {
                latest = Some((current, store));
            }
        }

        let Some((date, store)) = latest else {
            return Ok(None);
        };
        let missing: Vec<String> = {
            all_dates.sort_unstable();
            all_dates.dedup();
            all_dates
                .into_iter()
                .filter(|seen| !store.contains_date(*seen))
                .map(|seen| seen.to_string())
                .collect()
        };
        if !missing.is_empty() {
            warn!(
                missing = %missing.join(", "),
                "latest datastore lacks snapshots held elsewhere; re-import them"
            );
        }
        info!(%date, applicants = store.len(), "applicant data loaded");
        Ok(Some(store))
    }

    pub fn save_subjects(&self, catalog: &SubjectCatalog) -> Result<PathBuf, DatastoreError> {
        let path = self.subject_path();
        let mut writer = create(&self.dir, &path)?;
        write_subjects(&mut writer, &self.licence, catalog)?;
        writer.flush().map_err(|source| DatastoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), subjects = catalog.len(), "subject basedata saved");
        Ok(path)
    }

    pub fn load_subjects(&self) -> Result<Option<SubjectCatalog>, DatastoreError> {
        let path = self.subject_path();
        if !path.is_file() {
            debug!(path = %path.display(), "no subject basedata saved yet");
            return Ok(None);
        }
        read_subjects(open(&path)?, &self.licence).map(Some)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, DatastoreError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| DatastoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn create(dir: &Path, path: &Path) -> Result<BufWriter<File>, DatastoreError> {
    let io_error = |source| DatastoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_error)?;
    File::create(path).map(BufWriter::new).map_err(io_error)
}

/// Files in `dir` in name order, or `None` when the directory does not exist.
fn read_dir(dir: &Path) -> Result<Option<Vec<PathBuf>>, DatastoreError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let io_error = |source| DatastoreError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(Some(paths))
}
