//! Built-in dataset. Subjects are the fixed curriculum; everything else is
//! the seed used whenever a persisted collection is missing or unreadable.

use chrono::{Duration, Utc};

use crate::model::{Attendance, Grade, Message, MessageStatus, Role, Subject, User};

const DAM_GROUP: &str = "1º Desarrollo de Aplicaciones Multiplataforma";
const DAM_CYCLE: &str = "Desarrollo de Aplicaciones Multiplataforma";
const ACADEMIC_YEAR: &str = "2025-2026";

pub fn subjects() -> Vec<Subject> {
    [
        ("sub1", "Sistemas Informáticos", "Ana García"),
        ("sub2", "Bases de Datos", "Carlos Rodríguez"),
        ("sub3", "Programación", "Laura Martínez"),
        ("sub4", "Lenguajes de Marcas", "David López"),
        ("sub5", "Entornos de Desarrollo", "Elena Sánchez"),
        ("sub6", "IPE I", "Miguel Fernández"),
        ("sub7", "Inglés Profesional", "Sarah Smith"),
    ]
    .into_iter()
    .map(|(id, name, teacher)| Subject {
        id: id.to_string(),
        name: name.to_string(),
        teacher_name: teacher.to_string(),
    })
    .collect()
}

fn staff(id: &str, name: &str, username: &str, secret: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        username: username.to_string(),
        secret: Some(secret.to_string()),
        role,
        academic_year: None,
        level: None,
        cycle: None,
        group: None,
    }
}

fn student(nia: &str, name: &str, secret: &str) -> User {
    User {
        id: nia.to_string(),
        name: name.to_string(),
        username: nia.to_string(),
        secret: Some(secret.to_string()),
        role: Role::Student,
        academic_year: Some(ACADEMIC_YEAR.to_string()),
        level: Some("1º".to_string()),
        cycle: Some(DAM_CYCLE.to_string()),
        group: Some(DAM_GROUP.to_string()),
    }
}

pub fn users() -> Vec<User> {
    vec![
        staff(
            "admin1",
            "Administrador Principal",
            "admin",
            "admin123",
            Role::Admin,
        ),
        staff("teacher1", "Ana García", "ana.garcia", "ana123", Role::Teacher),
        student("2984619", "Imad El Ghoufairi Khouadri", "elgh2305"),
        student("1209362", "Walid Taibi El Ghoufairi", "elgh2810"),
    ]
}

/// First-semester scores only; the second semester is still open.
pub fn grades() -> Vec<Grade> {
    let rows: [(&str, [f64; 7]); 2] = [
        ("2984619", [8.7, 7.2, 9.4, 6.9, 8.1, 7.5, 10.0]),
        ("1209362", [6.2, 7.9, 8.5, 9.6, 6.8, 7.3, 9.0]),
    ];
    let mut out = Vec::new();
    for (student_id, scores) in rows {
        for (i, s1) in scores.iter().enumerate() {
            out.push(Grade {
                student_id: student_id.to_string(),
                subject_id: format!("sub{}", i + 1),
                semester1: Some(*s1),
                semester2: None,
            });
        }
    }
    out
}

pub fn attendance() -> Vec<Attendance> {
    [("2984619", "sub1", 3), ("1209362", "sub2", 8), ("1209362", "sub5", 5)]
        .into_iter()
        .map(|(student_id, subject_id, absences)| Attendance {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            absences,
            justified: None,
        })
        .collect()
}

pub fn messages() -> Vec<Message> {
    let now = Utc::now();
    vec![
        Message {
            id: "msg1".to_string(),
            student_id: "2984619".to_string(),
            student_name: "Imad El Ghoufairi Khouadri".to_string(),
            teacher_name: "Ana García".to_string(),
            subject_id: "sub1".to_string(),
            subject_name: "Sistemas Informáticos".to_string(),
            title: "Duda sobre la práctica 3".to_string(),
            body: "Buenos días profesora, tengo una duda sobre el ejercicio 2 de la práctica de Linux. ¿Podría explicarme si debemos usar permisos octales?".to_string(),
            response: Some(
                "Hola Imad. Sí, es preferible que uséis la notación octal para este ejercicio. Un saludo."
                    .to_string(),
            ),
            status: MessageStatus::Replied,
            sent_at: now - Duration::days(2),
            replied_at: Some(now - Duration::days(1)),
        },
        Message {
            id: "msg2".to_string(),
            student_id: "1209362".to_string(),
            student_name: "Walid Taibi El Ghoufairi".to_string(),
            teacher_name: "Laura Martínez".to_string(),
            subject_id: "sub3".to_string(),
            subject_name: "Programación".to_string(),
            title: "Falta de asistencia justificada".to_string(),
            body: "Hola Laura, mañana no podré asistir a clase por cita médica. Le llevaré el justificante el lunes.".to_string(),
            response: None,
            status: MessageStatus::Sent,
            sent_at: now - Duration::hours(1),
            replied_at: None,
        },
    ]
}
