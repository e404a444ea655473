use crate::calc::{self, TimeWindow};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{now_stamp, optional_str, require_i64, require_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

/// Scans the mentor's existing sessions for an overlap with the requested
/// window. Back-to-back sessions don't count; rows with unparseable dates
/// are skipped.
fn find_conflict(
    conn: &rusqlite::Connection,
    mentor_email: &str,
    requested: &TimeWindow,
    exclude_id: Option<&str>,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT id, class_date, duration_minutes FROM mentor_schedules WHERE mentor_email = ?",
    )?;
    let rows = stmt.query_map([mentor_email], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, i64>(2)?,
        ))
    })?;

    for row in rows {
        let (id, date_raw, duration) = row?;
        if exclude_id == Some(id.as_str()) {
            continue;
        }
        if let Some(start) = calc::parse_date_time(&date_raw) {
            let existing = TimeWindow::from_start(start, duration);
            if existing.overlaps(requested) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_email = match require_str(req, "studentEmail") {
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
    let description = optional_str(req, "description");
    let meeting_link = optional_str(req, "meetingLink");

    let Some(start) = calc::parse_date_time(&class_date) else {
        return err(&req.id, "bad_request", "invalid class date", None);
    };
    // Stored canonically so the upcoming* string comparisons stay correct for
    // T-separated and bare-date inputs.
    let class_date = start.format(calc::DATE_TIME_FMT).to_string();

    let paired: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM mentor_assignments WHERE mentor_email = ? AND student_email = ?",
            [&mentor_email, &student_email],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if paired.is_none() {
        return err(
            &req.id,
            "forbidden",
            "no mentor-student relationship found",
            None,
        );
    }

    let requested = TimeWindow::from_start(start, duration_minutes);
    match find_conflict(conn, &mentor_email, &requested, None) {
        Ok(true) => return err(&req.id, "conflict", "schedule conflict detected", None),
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let schedule_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO mentor_schedules
           (id, mentor_email, student_email, class_date, duration_minutes,
            description, meeting_link, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &schedule_id,
            &mentor_email,
            &student_email,
            &class_date,
            &duration_minutes,
            &description,
            &meeting_link,
            now_stamp(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "mentor_schedules" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Class scheduled successfully", "scheduleId": schedule_id }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT id, class_date, duration_minutes, description, meeting_link, created_at
         FROM mentor_schedules
         WHERE mentor_email = ? AND student_email = ?
         ORDER BY class_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&mentor_email, &student_email], |r| {
            Ok(json!({
                "scheduleId": r.get::<_, String>(0)?,
                "classDate": r.get::<_, String>(1)?,
                "durationMinutes": r.get::<_, i64>(2)?,
                "description": r.get::<_, Option<String>>(3)?,
                "meetingLink": r.get::<_, Option<String>>(4)?,
                "createdAt": r.get::<_, String>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(schedules) => ok(&req.id, json!({ "schedules": schedules })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_upcoming_for_mentor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT ms.id, ms.student_email, ms.class_date, ms.duration_minutes,
                ms.description, ms.meeting_link, sp.first_name, sp.last_name
         FROM mentor_schedules ms
         JOIN student_profiles sp ON ms.student_email = sp.email
         WHERE ms.mentor_email = ? AND ms.class_date >= ?
         ORDER BY ms.class_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&mentor_email, &now_stamp()], |r| {
            Ok(json!({
                "scheduleId": r.get::<_, String>(0)?,
                "studentEmail": r.get::<_, String>(1)?,
                "classDate": r.get::<_, String>(2)?,
                "durationMinutes": r.get::<_, i64>(3)?,
                "description": r.get::<_, Option<String>>(4)?,
                "meetingLink": r.get::<_, Option<String>>(5)?,
                "firstName": r.get::<_, String>(6)?,
                "lastName": r.get::<_, String>(7)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_upcoming_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT ms.id, ms.mentor_email, ms.class_date, ms.duration_minutes,
                ms.description, ms.meeting_link, m.full_name, m.expertise
         FROM mentor_schedules ms
         JOIN mentors m ON ms.mentor_email = m.email
         WHERE ms.student_email = ? AND ms.class_date >= ?
         ORDER BY ms.class_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&student_email, &now_stamp()], |r| {
            Ok(json!({
                "scheduleId": r.get::<_, String>(0)?,
                "mentorEmail": r.get::<_, String>(1)?,
                "classDate": r.get::<_, String>(2)?,
                "durationMinutes": r.get::<_, i64>(3)?,
                "description": r.get::<_, Option<String>>(4)?,
                "meetingLink": r.get::<_, Option<String>>(5)?,
                "mentorName": r.get::<_, String>(6)?,
                "mentorExpertise": r.get::<_, String>(7)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
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
    let mentor_email = match require_str(req, "mentorEmail") {
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
    let description = optional_str(req, "description");
    let meeting_link = optional_str(req, "meetingLink");

    let Some(start) = calc::parse_date_time(&class_date) else {
        return err(&req.id, "bad_request", "invalid class date", None);
    };
    let class_date = start.format(calc::DATE_TIME_FMT).to_string();

    // Rescheduling must not collide with the mentor's other sessions; the row
    // being moved is excluded from the scan.
    let requested = TimeWindow::from_start(start, duration_minutes);
    match find_conflict(conn, &mentor_email, &requested, Some(schedule_id.as_str())) {
        Ok(true) => return err(&req.id, "conflict", "schedule conflict detected", None),
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match conn.execute(
        "UPDATE mentor_schedules
         SET class_date = ?, duration_minutes = ?, description = ?, meeting_link = ?
         WHERE id = ? AND mentor_email = ?",
        (
            &class_date,
            &duration_minutes,
            &description,
            &meeting_link,
            &schedule_id,
            &mentor_email,
        ),
    ) {
        Ok(0) => err(
            &req.id,
            "not_found",
            "scheduled class not found or you don't have permission to update it",
            None,
        ),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Scheduled class updated successfully" }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let schedule_id = match require_str(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "DELETE FROM mentor_schedules WHERE id = ? AND mentor_email = ?",
        [&schedule_id, &mentor_email],
    ) {
        Ok(0) => err(
            &req.id,
            "not_found",
            "scheduled class not found or you don't have permission to cancel it",
            None,
        ),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Scheduled class canceled successfully" }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "mentorSchedules.create" => Some(handle_create(state, req)),
        "mentorSchedules.list" => Some(handle_list(state, req)),
        "mentorSchedules.upcomingForMentor" => Some(handle_upcoming_for_mentor(state, req)),
        "mentorSchedules.upcomingForStudent" => Some(handle_upcoming_for_student(state, req)),
        "mentorSchedules.update" => Some(handle_update(state, req)),
        "mentorSchedules.cancel" => Some(handle_cancel(state, req)),
        _ => None,
    }
}
