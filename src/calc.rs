use serde::Serialize;

use crate::model::{Attendance, Grade, Message, MessageStatus, Role, Semester, Subject, User};

pub const PASS_MARK: f64 = 5.0;

/// Two-decimal rounding used for every displayed average.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Defined only when both semesters are graded. A single semester never
/// yields a provisional final grade.
pub fn final_grade(s1: Option<f64>, s2: Option<f64>) -> Option<f64> {
    match (s1, s2) {
        (Some(a), Some(b)) => Some(round_2_decimals((a + b) / 2.0)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "score", rename_all = "lowercase")]
pub enum GradeStatus {
    Pending,
    Fail(f64),
    Pass(f64),
}

impl GradeStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, GradeStatus::Pass(_))
    }
}

pub fn subject_status(score: Option<f64>) -> GradeStatus {
    match score {
        None => GradeStatus::Pending,
        Some(s) if s >= PASS_MARK => GradeStatus::Pass(s),
        Some(s) => GradeStatus::Fail(s),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    S1,
    S2,
    Final,
}

impl Metric {
    /// Accepts the view names the portal uses; `summary` means the final grade.
    pub fn parse(raw: &str) -> Option<Metric> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "s1" | "1" => Some(Metric::S1),
            "s2" | "2" => Some(Metric::S2),
            "final" | "summary" => Some(Metric::Final),
            _ => None,
        }
    }

    pub fn of(self, grade: Option<&Grade>) -> Option<f64> {
        let g = grade?;
        match self {
            Metric::S1 => g.semester(Semester::First),
            Metric::S2 => g.semester(Semester::Second),
            Metric::Final => final_grade(g.semester1, g.semester2),
        }
    }
}

fn grade_for<'a>(grades: &'a [Grade], student_id: &str, subject_id: &str) -> Option<&'a Grade> {
    grades
        .iter()
        .find(|g| g.student_id == student_id && g.subject_id == subject_id)
}

/// Mean of `metric` over the subjects where it is defined for the student.
/// Undefined subjects are left out entirely; 0.0 when none is defined.
pub fn student_average(
    grades: &[Grade],
    subjects: &[Subject],
    student_id: &str,
    metric: Metric,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for sub in subjects {
        if let Some(v) = metric.of(grade_for(grades, student_id, &sub.id)) {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    round_2_decimals(sum / count as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub average: f64,
    pub graded_students: usize,
}

/// Per-student mean of the graded semesters, then the mean across students
/// with at least one graded semester.
pub fn subject_average(grades: &[Grade], subject_id: &str) -> SubjectAverage {
    let mut total = 0.0;
    let mut students = 0usize;
    for g in grades.iter().filter(|g| g.subject_id == subject_id) {
        let graded: Vec<f64> = [g.semester1, g.semester2].into_iter().flatten().collect();
        if graded.is_empty() {
            continue;
        }
        total += graded.iter().sum::<f64>() / graded.len() as f64;
        students += 1;
    }
    let average = if students > 0 {
        round_2_decimals(total / students as f64)
    } else {
        0.0
    };
    SubjectAverage {
        average,
        graded_students: students,
    }
}

/// Justified hours are included.
/// Summed as `u64`: each row may hold up to `u32::MAX` hours.
pub fn total_absence_hours(attendance: &[Attendance], student_id: &str) -> u64 {
    attendance
        .iter()
        .filter(|a| a.student_id == student_id)
        .map(|a| u64::from(a.absences))
        .sum()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject_id: String,
    pub subject_name: String,
    pub teacher_name: String,
    pub semester1: Option<f64>,
    pub semester2: Option<f64>,
    pub final_grade: Option<f64>,
    pub absences: u32,
    pub justified: u32,
    pub status: GradeStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub view: Metric,
    pub rows: Vec<SubjectRow>,
    pub average: f64,
    pub average_status: GradeStatus,
    pub total_absence_hours: u64,
    pub excessive_absences: bool,
}

pub fn student_report(
    grades: &[Grade],
    attendance: &[Attendance],
    subjects: &[Subject],
    student_id: &str,
    view: Metric,
    absence_warning_hours: u32,
) -> StudentReport {
    let rows = subjects
        .iter()
        .map(|sub| {
            let g = grade_for(grades, student_id, &sub.id);
            let a = attendance
                .iter()
                .find(|a| a.student_id == student_id && a.subject_id == sub.id);
            SubjectRow {
                subject_id: sub.id.clone(),
                subject_name: sub.name.clone(),
                teacher_name: sub.teacher_name.clone(),
                semester1: g.and_then(|g| g.semester1),
                semester2: g.and_then(|g| g.semester2),
                final_grade: Metric::Final.of(g),
                absences: a.map(|a| a.absences).unwrap_or(0),
                justified: a.and_then(|a| a.justified).unwrap_or(0),
                status: subject_status(view.of(g)),
            }
        })
        .collect::<Vec<_>>();

    let average = student_average(grades, subjects, student_id, view);
    let any_defined = rows
        .iter()
        .any(|r| !matches!(r.status, GradeStatus::Pending));
    let total = total_absence_hours(attendance, student_id);

    StudentReport {
        student_id: student_id.to_string(),
        view,
        rows,
        average,
        average_status: if any_defined {
            subject_status(Some(average))
        } else {
            GradeStatus::Pending
        },
        total_absence_hours: total,
        excessive_absences: total > u64::from(absence_warning_hours),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject_id: String,
    pub name: String,
    pub teacher_name: String,
    pub average: f64,
    pub graded_students: usize,
    pub passing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub student_count: usize,
    pub teacher_count: usize,
    pub subject_count: usize,
    pub message_count: usize,
    pub unread_messages: usize,
    pub subjects: Vec<SubjectStats>,
}

pub fn dashboard(
    users: &[User],
    subjects: &[Subject],
    grades: &[Grade],
    messages: &[Message],
) -> Dashboard {
    Dashboard {
        student_count: users.iter().filter(|u| u.role == Role::Student).count(),
        teacher_count: users.iter().filter(|u| u.role == Role::Teacher).count(),
        subject_count: subjects.len(),
        message_count: messages.len(),
        unread_messages: messages
            .iter()
            .filter(|m| m.status == MessageStatus::Sent)
            .count(),
        subjects: subjects
            .iter()
            .map(|sub| {
                let avg = subject_average(grades, &sub.id);
                SubjectStats {
                    subject_id: sub.id.clone(),
                    name: sub.name.clone(),
                    teacher_name: sub.teacher_name.clone(),
                    average: avg.average,
                    graded_students: avg.graded_students,
                    passing: subject_status(Some(avg.average)).is_pass(),
                }
            })
            .collect(),
    }
}
