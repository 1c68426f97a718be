use chrono::Utc;
use uuid::Uuid;

use crate::model::{
    Attendance, Grade, Message, MessageDraft, MessageStatus, Semester, StudentData, Subject, User,
};

/// The four mutable collections. Subjects are compiled in and never listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Grades,
    Attendance,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Grades,
        Collection::Attendance,
        Collection::Messages,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Collection::Users => "ies_users",
            Collection::Grades => "ies_grades",
            Collection::Attendance => "ies_attendance",
            Collection::Messages => "ies_messages",
        }
    }

    pub fn from_key(key: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// Which collections a mutation touched. Empty means the call was a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    users: bool,
    grades: bool,
    attendance: bool,
    messages: bool,
}

impl ChangeSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            users: true,
            grades: true,
            attendance: true,
            messages: true,
        }
    }

    pub fn of(c: Collection) -> Self {
        Self::none().with(c)
    }

    pub fn with(mut self, c: Collection) -> Self {
        *self.slot(c) = true;
        self
    }

    pub fn merge(&mut self, other: ChangeSet) {
        for c in other.iter() {
            *self.slot(c) = true;
        }
    }

    pub fn contains(&self, c: Collection) -> bool {
        match c {
            Collection::Users => self.users,
            Collection::Grades => self.grades,
            Collection::Attendance => self.attendance,
            Collection::Messages => self.messages,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.users || self.grades || self.attendance || self.messages)
    }

    pub fn iter(&self) -> impl Iterator<Item = Collection> {
        let this = *self;
        Collection::ALL.into_iter().filter(move |c| this.contains(*c))
    }

    fn slot(&mut self, c: Collection) -> &mut bool {
        match c {
            Collection::Users => &mut self.users,
            Collection::Grades => &mut self.grades,
            Collection::Attendance => &mut self.attendance,
            Collection::Messages => &mut self.messages,
        }
    }
}

/// A whole collection, as loaded from storage or received from another context.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionData {
    Users(Vec<User>),
    Grades(Vec<Grade>),
    Attendance(Vec<Attendance>),
    Messages(Vec<Message>),
}

impl CollectionData {
    pub fn collection(&self) -> Collection {
        match self {
            CollectionData::Users(_) => Collection::Users,
            CollectionData::Grades(_) => Collection::Grades,
            CollectionData::Attendance(_) => Collection::Attendance,
            CollectionData::Messages(_) => Collection::Messages,
        }
    }

    pub fn parse(c: Collection, raw: &str) -> serde_json::Result<CollectionData> {
        Ok(match c {
            Collection::Users => CollectionData::Users(serde_json::from_str(raw)?),
            Collection::Grades => CollectionData::Grades(serde_json::from_str(raw)?),
            Collection::Attendance => CollectionData::Attendance(serde_json::from_str(raw)?),
            Collection::Messages => CollectionData::Messages(serde_json::from_str(raw)?),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub users: Vec<User>,
    pub grades: Vec<Grade>,
    pub attendance: Vec<Attendance>,
    pub messages: Vec<Message>,
}

impl Collections {
    pub fn seed() -> Self {
        Collections {
            users: crate::defaults::users(),
            grades: crate::defaults::grades(),
            attendance: crate::defaults::attendance(),
            messages: crate::defaults::messages(),
        }
    }

    pub fn seed_of(c: Collection) -> CollectionData {
        match c {
            Collection::Users => CollectionData::Users(crate::defaults::users()),
            Collection::Grades => CollectionData::Grades(crate::defaults::grades()),
            Collection::Attendance => CollectionData::Attendance(crate::defaults::attendance()),
            Collection::Messages => CollectionData::Messages(crate::defaults::messages()),
        }
    }

    pub fn to_json(&self, c: Collection) -> serde_json::Result<String> {
        match c {
            Collection::Users => serde_json::to_string(&self.users),
            Collection::Grades => serde_json::to_string(&self.grades),
            Collection::Attendance => serde_json::to_string(&self.attendance),
            Collection::Messages => serde_json::to_string(&self.messages),
        }
    }

    /// Replace one collection wholesale. Reports a change only if the value differs.
    pub fn replace(&mut self, data: CollectionData) -> ChangeSet {
        let c = data.collection();
        let changed = match data {
            CollectionData::Users(v) => swap_if_different(&mut self.users, v),
            CollectionData::Grades(v) => swap_if_different(&mut self.grades, v),
            CollectionData::Attendance(v) => swap_if_different(&mut self.attendance, v),
            CollectionData::Messages(v) => swap_if_different(&mut self.messages, v),
        };
        if changed {
            ChangeSet::of(c)
        } else {
            ChangeSet::none()
        }
    }
}

fn swap_if_different<T: PartialEq>(slot: &mut Vec<T>, next: Vec<T>) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}

/// In-memory owner of every entity. Mutations return the collections they
/// touched; persisting them is the caller's job.
#[derive(Debug, Clone)]
pub struct EntityStore {
    subjects: Vec<Subject>,
    data: Collections,
}

impl EntityStore {
    pub fn new(subjects: Vec<Subject>, data: Collections) -> Self {
        Self { subjects, data }
    }

    pub fn users(&self) -> &[User] {
        &self.data.users
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn grades(&self) -> &[Grade] {
        &self.data.grades
    }

    pub fn attendance(&self) -> &[Attendance] {
        &self.data.attendance
    }

    pub fn messages(&self) -> &[Message] {
        &self.data.messages
    }

    pub fn collections(&self) -> &Collections {
        &self.data
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.data.users.iter().find(|u| u.id == id)
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.data.messages.iter().find(|m| m.id == id)
    }

    pub fn replace(&mut self, data: CollectionData) -> ChangeSet {
        self.data.replace(data)
    }

    pub fn replace_all(&mut self, data: Collections) -> ChangeSet {
        let mut changes = ChangeSet::none();
        changes.merge(self.replace(CollectionData::Users(data.users)));
        changes.merge(self.replace(CollectionData::Grades(data.grades)));
        changes.merge(self.replace(CollectionData::Attendance(data.attendance)));
        changes.merge(self.replace(CollectionData::Messages(data.messages)));
        changes
    }

    // Uniqueness of id/username is not checked here.
    pub fn add_user(&mut self, user: User) -> ChangeSet {
        self.data.users.push(user);
        ChangeSet::of(Collection::Users)
    }

    /// Replaces the record with the same id. Identical records are a no-op.
    pub fn update_user(&mut self, user: User) -> ChangeSet {
        match self.data.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) if *slot != user => {
                *slot = user;
                ChangeSet::of(Collection::Users)
            }
            _ => ChangeSet::none(),
        }
    }

    /// Rewrites a student's id everywhere it is referenced. All four
    /// collections are updated before this returns.
    pub fn update_student_id(&mut self, old_id: &str, new_id: &str) -> ChangeSet {
        if old_id == new_id {
            return ChangeSet::none();
        }
        let mut changes = ChangeSet::none();
        for u in self.data.users.iter_mut().filter(|u| u.id == old_id) {
            u.id = new_id.to_string();
            changes = changes.with(Collection::Users);
        }
        for g in self.data.grades.iter_mut().filter(|g| g.student_id == old_id) {
            g.student_id = new_id.to_string();
            changes = changes.with(Collection::Grades);
        }
        for a in self
            .data
            .attendance
            .iter_mut()
            .filter(|a| a.student_id == old_id)
        {
            a.student_id = new_id.to_string();
            changes = changes.with(Collection::Attendance);
        }
        for m in self
            .data
            .messages
            .iter_mut()
            .filter(|m| m.student_id == old_id)
        {
            m.student_id = new_id.to_string();
            changes = changes.with(Collection::Messages);
        }
        changes
    }

    pub fn delete_user(&mut self, id: &str) -> ChangeSet {
        let mut changes = ChangeSet::none();
        if retain_changed(&mut self.data.users, |u| u.id != id) {
            changes = changes.with(Collection::Users);
        }
        if retain_changed(&mut self.data.grades, |g| g.student_id != id) {
            changes = changes.with(Collection::Grades);
        }
        if retain_changed(&mut self.data.attendance, |a| a.student_id != id) {
            changes = changes.with(Collection::Attendance);
        }
        if retain_changed(&mut self.data.messages, |m| m.student_id != id) {
            changes = changes.with(Collection::Messages);
        }
        changes
    }

    /// Upsert one semester score. Callers clamp `score` to [0, 10] first.
    pub fn update_grade(
        &mut self,
        student_id: &str,
        subject_id: &str,
        semester: Semester,
        score: Option<f64>,
    ) -> ChangeSet {
        if let Some(g) = self
            .data
            .grades
            .iter_mut()
            .find(|g| g.student_id == student_id && g.subject_id == subject_id)
        {
            g.set_semester(semester, score);
            return ChangeSet::of(Collection::Grades);
        }
        let Some(score) = score else {
            return ChangeSet::none();
        };
        let mut g = Grade {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            semester1: None,
            semester2: None,
        };
        g.set_semester(semester, Some(score));
        self.data.grades.push(g);
        ChangeSet::of(Collection::Grades)
    }

    pub fn update_attendance(
        &mut self,
        student_id: &str,
        subject_id: &str,
        absences: u32,
        justified: Option<u32>,
    ) -> ChangeSet {
        if let Some(a) = self
            .data
            .attendance
            .iter_mut()
            .find(|a| a.student_id == student_id && a.subject_id == subject_id)
        {
            a.absences = absences;
            if justified.is_some() {
                a.justified = justified;
            }
            return ChangeSet::of(Collection::Attendance);
        }
        self.data.attendance.push(Attendance {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            absences,
            justified: Some(justified.unwrap_or(0)),
        });
        ChangeSet::of(Collection::Attendance)
    }

    pub fn student_data(&self, student_id: &str) -> StudentData {
        StudentData {
            grades: self
                .data
                .grades
                .iter()
                .filter(|g| g.student_id == student_id)
                .cloned()
                .collect(),
            attendance: self
                .data
                .attendance
                .iter()
                .filter(|a| a.student_id == student_id)
                .cloned()
                .collect(),
        }
    }

    /// Newest message goes first.
    pub fn send_message(&mut self, draft: MessageDraft) -> (Message, ChangeSet) {
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            student_id: draft.student_id,
            student_name: draft.student_name,
            teacher_name: draft.teacher_name,
            subject_id: draft.subject_id,
            subject_name: draft.subject_name,
            title: draft.title,
            body: draft.body,
            response: None,
            status: MessageStatus::Sent,
            sent_at: Utc::now(),
            replied_at: None,
        };
        self.data.messages.insert(0, msg.clone());
        (msg, ChangeSet::of(Collection::Messages))
    }

    pub fn reply_message(&mut self, id: &str, response: &str) -> ChangeSet {
        let Some(m) = self.data.messages.iter_mut().find(|m| m.id == id) else {
            return ChangeSet::none();
        };
        m.response = Some(response.to_string());
        m.status = MessageStatus::Replied;
        m.replied_at = Some(Utc::now());
        ChangeSet::of(Collection::Messages)
    }

    pub fn mark_as_read(&mut self, id: &str) -> ChangeSet {
        match self
            .data
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.status == MessageStatus::Sent)
        {
            Some(m) => {
                m.status = MessageStatus::Read;
                ChangeSet::of(Collection::Messages)
            }
            None => ChangeSet::none(),
        }
    }

    pub fn delete_message(&mut self, id: &str) -> ChangeSet {
        if retain_changed(&mut self.data.messages, |m| m.id != id) {
            ChangeSet::of(Collection::Messages)
        } else {
            ChangeSet::none()
        }
    }
}

fn retain_changed<T>(v: &mut Vec<T>, keep: impl FnMut(&T) -> bool) -> bool {
    let before = v.len();
    v.retain(keep);
    v.len() != before
}
