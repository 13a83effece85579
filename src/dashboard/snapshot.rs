//! Statistics Snapshot
//!
//! Aggregate metrics derived from one roster view. A snapshot is immutable
//! once built and is replaced wholesale by the next computation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StatisticsError;
use crate::roster::RosterView;

/// Averages closer than this are treated as a tie.
const TIE_EPSILON: f64 = 1e-9;

// == Grade Distribution ==
/// Five-bucket letter distribution: A >= 90, B >= 80, C >= 70, D >= 60, F below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
    pub f: usize,
}

impl GradeDistribution {
    fn record(&mut self, grade: f64) {
        let bucket = match grade {
            g if g >= 90.0 => &mut self.a,
            g if g >= 80.0 => &mut self.b,
            g if g >= 70.0 => &mut self.c,
            g if g >= 60.0 => &mut self.d,
            _ => &mut self.f,
        };
        *bucket += 1;
    }

    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d + self.f
    }
}

// == Performer Group ==
/// Students sharing one average, with the rank of that average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformerGroup {
    /// 1-based position of this group in the ranking
    pub rank: usize,
    pub average: f64,
    /// Student names, alphabetical
    pub students: Vec<String>,
}

// == Statistics Snapshot ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub grade_distribution: GradeDistribution,
    pub top_performers: Vec<PerformerGroup>,
    pub student_count: usize,
    pub grade_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl StatisticsSnapshot {
    // == Compute ==
    /// Builds a snapshot from every grade in `view`.
    ///
    /// `top_n` is the minimum number of students reported as top
    /// performers; a tie group straddling the cut is included whole.
    pub fn compute(view: &RosterView, top_n: usize) -> Result<Self, StatisticsError> {
        for student in &view.students {
            if let Some(bad) = student.grades.iter().find(|g| !g.is_finite()) {
                return Err(StatisticsError::InvalidGrade {
                    student: student.id.clone(),
                    value: *bad,
                });
            }
        }

        let mut grades: Vec<f64> = view.grades().collect();
        if grades.is_empty() {
            return Err(StatisticsError::EmptyDataset);
        }

        let count = grades.len() as f64;
        let mean = grades.iter().sum::<f64>() / count;
        let variance = grades.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / count;

        let mut grade_distribution = GradeDistribution::default();
        for grade in &grades {
            grade_distribution.record(*grade);
        }

        grades.sort_by(f64::total_cmp);
        let mid = grades.len() / 2;
        let median = if grades.len() % 2 == 0 {
            (grades[mid - 1] + grades[mid]) / 2.0
        } else {
            grades[mid]
        };

        Ok(Self {
            mean,
            median,
            std_dev: variance.sqrt(),
            grade_distribution,
            top_performers: rank_performers(view, top_n),
            student_count: view.students.len(),
            grade_count: grades.len(),
            computed_at: Utc::now(),
        })
    }
}

/// Ranks students by average, grouping ties.
fn rank_performers(view: &RosterView, top_n: usize) -> Vec<PerformerGroup> {
    let mut averages: Vec<(f64, &str)> = view
        .students
        .iter()
        .filter_map(|s| s.average().map(|avg| (avg, s.name.as_str())))
        .collect();
    averages.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    let mut groups: Vec<PerformerGroup> = Vec::new();
    let mut included = 0;
    for (average, name) in averages {
        match groups.last_mut() {
            Some(group) if (group.average - average).abs() < TIE_EPSILON => {
                group.students.push(name.to_string());
                included += 1;
            }
            _ => {
                if included >= top_n {
                    break;
                }
                groups.push(PerformerGroup {
                    rank: groups.len() + 1,
                    average,
                    students: vec![name.to_string()],
                });
                included += 1;
            }
        }
    }
    groups
}

// == Rendering ==
impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Statistics ({} students, {} grades) at {}",
            self.student_count,
            self.grade_count,
            self.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  Mean: {:.2}  Median: {:.2}  Std dev: {:.2}",
            self.mean, self.median, self.std_dev
        )?;
        let d = &self.grade_distribution;
        writeln!(
            f,
            "  Distribution: A={} B={} C={} D={} F={}",
            d.a, d.b, d.c, d.d, d.f
        )?;
        writeln!(f, "  Top performers:")?;
        for group in &self.top_performers {
            writeln!(
                f,
                "    #{} {:.2} {}",
                group.rank,
                group.average,
                group.students.join(", ")
            )?;
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Student;

    fn view(students: Vec<(&str, Vec<f64>)>) -> RosterView {
        RosterView::new(
            students
                .into_iter()
                .enumerate()
                .map(|(i, (name, grades))| Student::new(format!("s{i}"), name, grades))
                .collect(),
        )
    }

    #[test]
    fn test_basic_aggregates() {
        let view = view(vec![("Ada", vec![90.0, 70.0]), ("Grace", vec![80.0, 60.0])]);

        let snapshot = StatisticsSnapshot::compute(&view, 5).unwrap();

        assert_eq!(snapshot.mean, 75.0);
        assert_eq!(snapshot.median, 75.0);
        assert!((snapshot.std_dev - 125.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(snapshot.grade_count, 4);
        assert_eq!(snapshot.student_count, 2);
    }

    #[test]
    fn test_median_odd_count() {
        let view = view(vec![("Ada", vec![10.0, 99.0, 50.0])]);

        let snapshot = StatisticsSnapshot::compute(&view, 1).unwrap();

        assert_eq!(snapshot.median, 50.0);
    }

    #[test]
    fn test_distribution_buckets() {
        let view = view(vec![(
            "Ada",
            vec![100.0, 90.0, 89.9, 80.0, 75.0, 60.0, 59.9, 0.0],
        )]);

        let snapshot = StatisticsSnapshot::compute(&view, 1).unwrap();

        assert_eq!(
            snapshot.grade_distribution,
            GradeDistribution { a: 2, b: 2, c: 1, d: 1, f: 2 }
        );
        assert_eq!(snapshot.grade_distribution.total(), 8);
    }

    #[test]
    fn test_top_performers_group_ties() {
        let view = view(vec![
            ("Carol", vec![95.0]),
            ("Alan", vec![90.0, 100.0]),
            ("Bob", vec![85.0]),
            ("Dana", vec![70.0]),
            ("Eve", vec![85.0]),
        ]);

        let snapshot = StatisticsSnapshot::compute(&view, 3).unwrap();
        let top = &snapshot.top_performers;

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].students, vec!["Alan", "Carol"]);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[1].average, 85.0);
        assert_eq!(top[1].students, vec!["Bob", "Eve"]);
    }

    #[test]
    fn test_students_without_grades_not_ranked() {
        let view = view(vec![("Ada", vec![]), ("Grace", vec![50.0])]);

        let snapshot = StatisticsSnapshot::compute(&view, 5).unwrap();

        assert_eq!(snapshot.top_performers.len(), 1);
        assert_eq!(snapshot.top_performers[0].students, vec!["Grace"]);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let result = StatisticsSnapshot::compute(&view(vec![("Ada", vec![])]), 5);
        assert!(matches!(result, Err(StatisticsError::EmptyDataset)));
    }

    #[test]
    fn test_non_finite_grade_fails() {
        let result = StatisticsSnapshot::compute(&view(vec![("Ada", vec![80.0, f64::NAN])]), 5);
        assert!(matches!(
            result,
            Err(StatisticsError::InvalidGrade { ref student, .. }) if student == "s0"
        ));
    }

    #[test]
    fn test_render_contains_sections() {
        let view = view(vec![("Ada", vec![91.0])]);
        let rendered = StatisticsSnapshot::compute(&view, 1).unwrap().to_string();

        assert!(rendered.contains("Mean: 91.00"));
        assert!(rendered.contains("A=1"));
        assert!(rendered.contains("#1 91.00 Ada"));
    }
}
