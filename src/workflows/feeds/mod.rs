//! Line-level readers for the external feeds: dated status snapshots, SIMS extracts,
//! marksheet predictions, and the exam board's fixed-width basedata and results files.

pub mod basedata;
pub mod predictions;
pub mod results;
pub mod sims;
pub mod status;

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed header: {0}")]
    MalformedHeader(String),
}

/// Outcome of reading one fixed-width exam board line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamLine<T> {
    Record(T),
    Header,
    Malformed(String),
}

/// Columns `start..end` of a fixed-width line, clamped to the line length.
pub(crate) fn fixed_field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start.min(end)..end).unwrap_or_default()
}

/// Exam board files in `dir` whose name starts with `initial` (any case) and whose
/// extension starts with `X`, in name order.
pub fn exam_files(dir: &Path, initial: char) -> Result<Vec<PathBuf>, FeedError> {
    let entries = std::fs::read_dir(dir).map_err(|source| FeedError::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let starts = name
            .chars()
            .next()
            .is_some_and(|c| c.eq_ignore_ascii_case(&initial));
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.to_ascii_uppercase().starts_with('X'));
        if path.is_file() && starts && extension {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Lines of several files read one after the other as a single finite stream.
pub struct FeedLines {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<Lines<BufReader<File>>>,
}

impl FeedLines {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            current: None,
        }
    }
}

impl Iterator for FeedLines {
    type Item = Result<String, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lines) = self.current.as_mut() {
                match lines.next() {
                    Some(line) => return Some(line.map_err(FeedError::from)),
                    None => self.current = None,
                }
            }

            let path = self.files.next()?;
            tracing::debug!(path = %path.display(), "reading feed file");
            match File::open(&path) {
                Ok(file) => self.current = Some(BufReader::new(file).lines()),
                Err(source) => return Some(Err(FeedError::Open { path, source })),
            }
        }
    }
}
