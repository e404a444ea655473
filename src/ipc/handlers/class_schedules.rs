use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, enrollment_gate, optional_str, require_i64, require_str, teacher_owns_course,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

// Course class scheduling deliberately performs no overlap detection; any
// number of classes may share a time slot. Mentor sessions are the
// conflict-checked path (mentor_schedules).

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_date = match require_str(req, "classDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let duration_minutes = match require_i64(req, "durationMinutes") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = optional_str(req, "description").unwrap_or_default();
    let meeting_link = optional_str(req, "meetingLink").unwrap_or_default();

    match course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let schedule_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO class_schedules
           (id, course_id, class_date, duration_minutes, description, meeting_link)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &schedule_id,
            &course_id,
            &class_date,
            &duration_minutes,
            &description,
            &meeting_link,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "class_schedules" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Class scheduled successfully", "scheduleId": schedule_id }),
    )
}

fn handle_list_for_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(resp) = enrollment_gate(conn, req, &course_id) {
        return resp;
    }

    let mut stmt = match conn.prepare(
        "SELECT id, course_id, class_date, duration_minutes, description, meeting_link
         FROM class_schedules
         WHERE course_id = ?
         ORDER BY class_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&course_id], |r| {
            Ok(json!({
                "scheduleId": r.get::<_, String>(0)?,
                "courseId": r.get::<_, String>(1)?,
                "classDate": r.get::<_, String>(2)?,
                "durationMinutes": r.get::<_, i64>(3)?,
                "description": r.get::<_, String>(4)?,
                "meetingLink": r.get::<_, String>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(schedules) => ok(&req.id, json!({ "schedules": schedules })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Resolves a schedule's owning course and requires the caller to own it.
fn schedule_owner_gate(
    conn: &rusqlite::Connection,
    req: &Request,
    schedule_id: &str,
) -> Result<(), serde_json::Value> {
    let Some(teacher_email) = optional_str(req, "teacherEmail") else {
        return Err(err(&req.id, "unauthorized", "teacher email is required", None));
    };

    let course_id: Option<String> = match conn
        .query_row(
            "SELECT course_id FROM class_schedules WHERE id = ?",
            [schedule_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };
    let Some(course_id) = course_id else {
        return Err(err(&req.id, "not_found", "class schedule not found", None));
    };

    match teacher_owns_course(conn, &course_id, &teacher_email) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(
            &req.id,
            "forbidden",
            "you don't have permission to modify this schedule",
            None,
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let schedule_id = match require_str(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_date = match require_str(req, "classDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let duration_minutes = match require_i64(req, "durationMinutes") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = optional_str(req, "description").unwrap_or_default();
    let meeting_link = optional_str(req, "meetingLink").unwrap_or_default();

    if let Err(resp) = schedule_owner_gate(conn, req, &schedule_id) {
        return resp;
    }

    match conn.execute(
        "UPDATE class_schedules
         SET class_date = ?, duration_minutes = ?, description = ?, meeting_link = ?
         WHERE id = ?",
        (
            &class_date,
            &duration_minutes,
            &description,
            &meeting_link,
            &schedule_id,
        ),
    ) {
        Ok(0) => err(&req.id, "not_found", "class schedule not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Class schedule updated successfully" }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let schedule_id = match require_str(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(resp) = schedule_owner_gate(conn, req, &schedule_id) {
        return resp;
    }

    match conn.execute("DELETE FROM class_schedules WHERE id = ?", [&schedule_id]) {
        Ok(0) => err(&req.id, "not_found", "class schedule not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Class schedule deleted successfully" }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classSchedules.create" => Some(handle_create(state, req)),
        "classSchedules.listForCourse" => Some(handle_list_for_course(state, req)),
        "classSchedules.update" => Some(handle_update(state, req)),
        "classSchedules.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
