use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{now_stamp, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

// Scheduled meetings are a plain log; unlike mentor_schedules there is no
// relationship gate and no conflict detection.

fn handle_schedule(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let meeting_date = match require_str(req, "meetingDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let meeting_link = match require_str(req, "meetingLink") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let meeting_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO scheduled_meetings
           (id, mentor_email, student_email, meeting_date, meeting_link, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &meeting_id,
            &mentor_email,
            &student_email,
            &meeting_date,
            &meeting_link,
            now_stamp(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "scheduled_meetings" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Meeting scheduled successfully", "meetingId": meeting_id }),
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
        "SELECT id, mentor_email, student_email, meeting_date, meeting_link, created_at
         FROM scheduled_meetings
         WHERE mentor_email = ? AND student_email = ?
         ORDER BY meeting_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&mentor_email, &student_email], |r| {
            Ok(json!({
                "meetingId": r.get::<_, String>(0)?,
                "mentorEmail": r.get::<_, String>(1)?,
                "studentEmail": r.get::<_, String>(2)?,
                "meetingDate": r.get::<_, String>(3)?,
                "meetingLink": r.get::<_, String>(4)?,
                "createdAt": r.get::<_, String>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(meetings) => ok(&req.id, json!({ "meetings": meetings })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "DELETE FROM scheduled_meetings WHERE student_email = ? AND mentor_email = ?",
        [&student_email, &mentor_email],
    ) {
        Ok(0) => err(&req.id, "not_found", "scheduled meeting not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "message": "Scheduled meeting removed successfully" }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "meetings.schedule" => Some(handle_schedule(state, req)),
        "meetings.list" => Some(handle_list(state, req)),
        "meetings.cancel" => Some(handle_cancel(state, req)),
        _ => None,
    }
}
