use serde::{Deserialize, Serialize};

/// Qualification level carried by full A-level subjects.
pub const ALEVEL: &str = "GCE A";

/// Qualification levels the exam board publishes that the tracker recognises.
pub const KNOWN_LEVELS: [&str; 5] = [ALEVEL, "GCE ASB", "EXPJB", "GCSEFC", "GCSESC"];

/// Unit type characters: grade-only, mark-and-grade, mark-only.
pub const GRADE_ONLY_TYPES: &str = "123";
pub const MARK_AND_GRADE_TYPES: &str = "BC";
pub const MARK_ONLY_TYPES: &str = "UM";

pub fn is_known_unit_type(unit_type: char) -> bool {
    GRADE_ONLY_TYPES.contains(unit_type)
        || MARK_AND_GRADE_TYPES.contains(unit_type)
        || MARK_ONLY_TYPES.contains(unit_type)
}

/// A unit definition from the exam board basedata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub unit_code: String,
    pub spec_code: String,
    pub qualification_level: String,
    pub unit_type: char,
    pub name: String,
    pub max_ums: u32,
    /// Marksheet subject name this unit maps to, when known.
    #[serde(default)]
    pub sims_name: Option<String>,
}

impl Subject {
    pub fn is_alevel(&self) -> bool {
        self.qualification_level == ALEVEL
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) in {} ({}/{})",
            self.qualification_level, self.unit_type, self.name, self.spec_code, self.unit_code
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCatalog {
    subjects: Vec<Subject>,
}

impl SubjectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_subjects(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    /// Adds a subject, replacing any earlier definition of the same unit code.
    pub fn insert(&mut self, subject: Subject) {
        match self
            .subjects
            .iter_mut()
            .find(|existing| existing.unit_code == subject.unit_code)
        {
            Some(existing) => *existing = subject,
            None => self.subjects.push(subject),
        }
    }

    pub fn by_unit_code(&self, unit_code: &str) -> Option<&Subject> {
        self.subjects
            .iter()
            .find(|subject| subject.unit_code == unit_code)
    }

    pub fn by_sims_name(&self, sims_name: &str) -> Option<&Subject> {
        self.subjects
            .iter()
            .find(|subject| subject.sims_name.as_deref() == Some(sims_name))
    }

    /// Maps a unit to a marksheet subject name. Returns false for an unknown unit.
    pub fn map_sims_name(&mut self, unit_code: &str, sims_name: &str) -> bool {
        match self
            .subjects
            .iter_mut()
            .find(|subject| subject.unit_code == unit_code)
        {
            Some(subject) => {
                subject.sims_name = Some(sims_name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
