use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, optional_str, require_str, student_id_for_email, teacher_owns_course, today,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

// Only the UNIQUE(student_id, course_id) breach counts; a foreign-key failure
// is a different problem and must not read as a duplicate enrollment.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let student_id = match student_id_for_email(conn, &student_email) {
        Ok(Some(id)) => id,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let already: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND course_id = ?",
            [&student_id, &course_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if already.is_some() {
        return err(
            &req.id,
            "conflict",
            "student is already enrolled in this course",
            None,
        );
    }

    let enrollment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(id, student_id, course_id, enrollment_date, status)
         VALUES(?, ?, ?, ?, 'Pending')",
        (&enrollment_id, &student_id, &course_id, today()),
    ) {
        // The UNIQUE(student_id, course_id) constraint is the real invariant
        // enforcer; a racing insert surfaces here rather than above.
        if is_unique_violation(&e) {
            return err(
                &req.id,
                "conflict",
                "student is already enrolled in this course",
                None,
            );
        }
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Enrollment successful", "enrollmentId": enrollment_id }),
    )
}

fn handle_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let student_id = match student_id_for_email(conn, &student_email) {
        Ok(Some(id)) => id,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare(
        "SELECT e.id, e.course_id, e.enrollment_date, e.status,
                c.title, c.description, c.category, c.duration_hours,
                c.start_date, c.end_date
         FROM enrollments e
         INNER JOIN courses c ON e.course_id = c.id
         WHERE e.student_id = ?
         ORDER BY e.enrollment_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&student_id], |r| {
            let status: String = r.get(3)?;
            Ok(json!({
                "enrollmentId": r.get::<_, String>(0)?,
                "courseId": r.get::<_, String>(1)?,
                "enrollmentDate": r.get::<_, String>(2)?,
                // Plain "progress" here is the dashboard placeholder; real
                // per-course metrics come from assignments.progress.
                "progress": 0,
                "status": if status.is_empty() { "Enrolled".to_string() } else { status },
                "title": r.get::<_, String>(4)?,
                "description": r.get::<_, String>(5)?,
                "category": r.get::<_, String>(6)?,
                "durationHours": r.get::<_, i64>(7)?,
                "startDate": r.get::<_, String>(8)?,
                "endDate": r.get::<_, String>(9)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_list_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT sp.id, sp.first_name, sp.last_name, sp.email, sp.phone_number,
                sp.education_level, e.enrollment_date
         FROM student_profiles sp
         JOIN enrollments e ON sp.id = e.student_id
         WHERE e.course_id = ?
         ORDER BY e.enrollment_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&course_id], |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "firstName": r.get::<_, String>(1)?,
                "lastName": r.get::<_, String>(2)?,
                "email": r.get::<_, String>(3)?,
                "phoneNumber": r.get::<_, String>(4)?,
                "educationLevel": r.get::<_, String>(5)?,
                "enrollmentDate": r.get::<_, String>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_set_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let enrollment_id = match require_str(req, "enrollmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match require_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "UPDATE enrollments SET status = ? WHERE id = ?",
        [&status, &enrollment_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "enrollment not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Enrollment status updated successfully" }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "DELETE FROM enrollments WHERE course_id = ? AND student_id = ?",
        [&course_id, &student_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "enrollment not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Student removed from the course successfully" }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_remove_by_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(teacher_email) = optional_str(req, "teacherEmail") else {
        return err(&req.id, "unauthorized", "teacher email is required", None);
    };

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

    match conn.execute(
        "DELETE FROM enrollments WHERE course_id = ? AND student_id = ?",
        [&course_id, &student_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "student not found in the course", None),
        Ok(_) => ok(&req.id, json!({ "message": "Student removed from the course" })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_create(state, req)),
        "enrollments.listForStudent" => Some(handle_list_for_student(state, req)),
        "enrollments.listStudents" => Some(handle_list_students(state, req)),
        "enrollments.setStatus" => Some(handle_set_status(state, req)),
        "enrollments.remove" => Some(handle_remove(state, req)),
        "enrollments.removeByTeacher" => Some(handle_remove_by_teacher(state, req)),
        _ => None,
    }
}
