use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

/// Stored user record. `secret` is persisted under the legacy `password`
/// field and must never leave the store except through [`Principal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(
        rename = "password",
        alias = "secret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secret: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A user with the secret stripped. This is the only shape of a user that
/// reads and the session ever hand out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl From<&User> for Principal {
    fn from(u: &User) -> Self {
        Principal {
            id: u.id.clone(),
            name: u.name.clone(),
            username: u.username.clone(),
            role: u.role,
            academic_year: u.academic_year.clone(),
            level: u.level.clone(),
            cycle: u.cycle.clone(),
            group: u.group.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub teacher_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn from_number(n: i64) -> Option<Semester> {
        match n {
            1 => Some(Semester::First),
            2 => Some(Semester::Second),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub student_id: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester2: Option<f64>,
}

impl Grade {
    pub fn semester(&self, semester: Semester) -> Option<f64> {
        match semester {
            Semester::First => self.semester1,
            Semester::Second => self.semester2,
        }
    }

    pub fn set_semester(&mut self, semester: Semester, score: Option<f64>) {
        match semester {
            Semester::First => self.semester1 = score,
            Semester::Second => self.semester2 = score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub student_id: String,
    pub subject_id: String,
    pub absences: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justified: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
    Replied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub teacher_name: String,
    pub subject_id: String,
    pub subject_name: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub status: MessageStatus,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied_at: Option<DateTime<Utc>>,
}

/// Everything a student supplies when writing to a teacher. The store fills
/// in id, status and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub student_id: String,
    pub student_name: String,
    pub teacher_name: String,
    pub subject_id: String,
    pub subject_name: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentData {
    pub grades: Vec<Grade>,
    pub attendance: Vec<Attendance>,
}
