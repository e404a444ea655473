use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_i64, require_str, teacher_owns_course};
use crate::ipc::types::{AppState, Request};
use rusqlite::{OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

fn course_json(r: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "courseId": r.get::<_, String>(0)?,
        "title": r.get::<_, String>(1)?,
        "description": r.get::<_, String>(2)?,
        "category": r.get::<_, String>(3)?,
        "durationHours": r.get::<_, i64>(4)?,
        "startDate": r.get::<_, String>(5)?,
        "endDate": r.get::<_, String>(6)?,
        "teacherEmail": r.get::<_, String>(7)?
    }))
}

const COURSE_COLS: &str =
    "id, title, description, category, duration_hours, start_date, end_date, teacher_email";

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let title = match require_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match require_str(req, "description") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category = match require_str(req, "category") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let duration_hours = match require_i64(req, "durationHours") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_date = match require_str(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end_date = match require_str(req, "endDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_email = match require_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let course_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO courses
           (id, title, description, category, duration_hours, start_date, end_date, teacher_email)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &course_id,
            &title,
            &description,
            &category,
            &duration_hours,
            &start_date,
            &end_date,
            &teacher_email,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Course deployed successfully", "courseId": course_id }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(&format!("SELECT {} FROM courses", COURSE_COLS)) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| course_json(r))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_list_for_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_email = match require_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Enrollment aggregates via correlated subqueries to avoid double-counting
    // from joins.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id, c.title, c.description, c.category, c.duration_hours,
           c.start_date, c.end_date, c.teacher_email,
           (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrolled_students,
           (SELECT GROUP_CONCAT(sp.first_name || ' ' || sp.last_name, ', ')
              FROM enrollments e
              JOIN student_profiles sp ON sp.id = e.student_id
             WHERE e.course_id = c.id) AS enrolled_student_names
         FROM courses c
         WHERE c.teacher_email = ?
         ORDER BY c.start_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&teacher_email], |r| {
            let mut course = course_json(r)?;
            course["enrolledStudents"] = json!(r.get::<_, i64>(8)?);
            course["enrolledStudentNames"] = json!(r.get::<_, Option<String>>(9)?);
            Ok(course)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_verify_ownership(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_email = match require_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match teacher_owns_course(conn, &course_id, &teacher_email) {
        Ok(is_owner) => ok(&req.id, json!({ "isOwner": is_owner })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_email = match require_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [&course_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    // Deletion is owner-only; the ownership check runs server-side on every
    // mutating course method, not just the advisory verifyOwnership read.
    match teacher_owns_course(conn, &course_id, &teacher_email) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "forbidden",
                "you don't have permission to modify this course",
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    if let Err(e) = tx.execute(
        "DELETE FROM submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [&course_id],
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "submissions" })),
        );
    }

    if let Err(e) = tx.execute("DELETE FROM assignments WHERE course_id = ?", [&course_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }

    if let Err(e) = tx.execute(
        "DELETE FROM class_schedules WHERE course_id = ?",
        [&course_id],
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "class_schedules" })),
        );
    }

    if let Err(e) = tx.execute(
        "DELETE FROM course_materials WHERE course_id = ?",
        [&course_id],
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "course_materials" })),
        );
    }

    if let Err(e) = tx.execute("DELETE FROM enrollments WHERE course_id = ?", [&course_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    if let Err(e) = tx.execute("DELETE FROM courses WHERE id = ?", [&course_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "message": "Course deleted successfully" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_create(state, req)),
        "courses.list" => Some(handle_list(state, req)),
        "courses.listForTeacher" => Some(handle_list_for_teacher(state, req)),
        "courses.verifyOwnership" => Some(handle_verify_ownership(state, req)),
        "courses.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
