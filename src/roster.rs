//! Roster Module
//!
//! Read-only, point-in-time view of the student collection consumed by the
//! statistics dashboard, plus an in-memory source for the server binary.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// == Student ==
/// A student and the grades recorded for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grades: Vec<f64>,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>, grades: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grades,
        }
    }

    /// Mean of this student's grades, or None when no grade is recorded.
    pub fn average(&self) -> Option<f64> {
        if self.grades.is_empty() {
            return None;
        }
        Some(self.grades.iter().sum::<f64>() / self.grades.len() as f64)
    }
}

// == Roster View ==
/// Snapshot of the roster. Later roster updates are not reflected.
#[derive(Debug, Clone, Default)]
pub struct RosterView {
    pub students: Vec<Student>,
}

impl RosterView {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    /// Iterates every grade of every student.
    pub fn grades(&self) -> impl Iterator<Item = f64> + '_ {
        self.students.iter().flat_map(|s| s.grades.iter().copied())
    }

    pub fn grade_count(&self) -> usize {
        self.students.iter().map(|s| s.grades.len()).sum()
    }
}

// == Roster Source ==
/// Provider of roster snapshots.
pub trait RosterSource: Send + Sync {
    /// Returns a consistent snapshot of the current roster.
    fn view(&self) -> anyhow::Result<RosterView>;
}

// == In-Memory Roster ==
/// Roster held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    students: RwLock<Vec<Student>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(students: Vec<Student>) -> Self {
        Self {
            students: RwLock::new(students),
        }
    }

    /// Inserts a student or replaces the one with the same id.
    ///
    /// Returns true when an existing student was replaced.
    pub fn upsert(&self, student: Student) -> bool {
        let mut students = self.students.write();
        match students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => {
                *existing = student;
                true
            }
            None => {
                students.push(student);
                false
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<Student> {
        let mut students = self.students.write();
        let pos = students.iter().position(|s| s.id == id)?;
        Some(students.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.students.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RosterSource for InMemoryRoster {
    fn view(&self) -> anyhow::Result<RosterView> {
        Ok(RosterView::new(self.students.read().clone()))
    }
}
