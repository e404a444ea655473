use crate::calc::DATE_TIME_FMT;
use crate::ipc::error::err;
use crate::ipc::types::Request;
use rusqlite::{Connection, OptionalExtension};

pub fn now_stamp() -> String {
    chrono::Utc::now().format(DATE_TIME_FMT).to_string()
}

pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

pub fn require_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(
            &req.id,
            "bad_request",
            format!("missing required field: {}", key),
            None,
        )),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    let v = req.params.get(key);
    let parsed = v
        .and_then(|v| v.as_i64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()));
    match parsed {
        Some(n) => Ok(n),
        None => Err(err(
            &req.id,
            "bad_request",
            format!("missing required field: {}", key),
            None,
        )),
    }
}

pub fn require_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    let v = req.params.get(key);
    let parsed = v
        .and_then(|v| v.as_f64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()));
    match parsed {
        Some(n) => Ok(n),
        None => Err(err(
            &req.id,
            "bad_request",
            format!("missing required field: {}", key),
            None,
        )),
    }
}

pub fn student_id_for_email(
    conn: &Connection,
    email: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM student_profiles WHERE email = ?",
        [email],
        |r| r.get(0),
    )
    .optional()
}

pub fn course_exists(conn: &Connection, course_id: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub fn teacher_owns_course(
    conn: &Connection,
    course_id: &str,
    teacher_email: &str,
) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM courses WHERE id = ? AND teacher_email = ?",
            [course_id, teacher_email],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Enrollment gate for course content reads. Resolves the caller's student id
/// and requires an enrollment row linking them to the course:
/// missing studentEmail -> unauthorized, unknown student -> not_found,
/// not enrolled -> forbidden.
pub fn enrollment_gate(
    conn: &Connection,
    req: &Request,
    course_id: &str,
) -> Result<String, serde_json::Value> {
    let Some(student_email) = optional_str(req, "studentEmail") else {
        return Err(err(&req.id, "unauthorized", "student email not provided", None));
    };

    let student_id = match student_id_for_email(conn, &student_email) {
        Ok(Some(id)) => id,
        Ok(None) => return Err(err(&req.id, "not_found", "student not found", None)),
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };

    let enrolled = match conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND student_id = ?",
            [course_id, student_id.as_str()],
            |r| r.get::<_, i64>(0),
        )
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };

    if !enrolled {
        return Err(err(
            &req.id,
            "forbidden",
            "student is not enrolled in this course",
            None,
        ));
    }

    Ok(student_id)
}
