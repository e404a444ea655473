use crate::calc::{self, AssignmentOutcome};
use crate::files;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, enrollment_gate, now_stamp, optional_str, require_f64, require_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match require_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match require_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let due_date = match require_str(req, "dueDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_score = match require_f64(req, "maxScore") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = optional_str(req, "description");

    if calc::parse_date_time(&due_date).is_none() {
        return err(&req.id, "bad_request", "invalid due date", None);
    }

    match course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // Optional PDF attachment, staged on disk by the HTTP front.
    let mut file_path: Option<String> = None;
    let mut file_name: Option<String> = None;
    if let Some(source) = optional_str(req, "sourceFilePath") {
        match files::store_pdf_upload(&workspace, &PathBuf::from(&source), "assignment") {
            Ok(stored) => {
                file_path = Some(stored.stored_path.to_string_lossy().to_string());
                file_name = Some(stored.file_name);
            }
            Err(e) => return err(&req.id, "bad_request", e.to_string(), None),
        }
    }

    let assignment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO assignments
           (id, course_id, title, description, due_date, max_score, file_path, file_name)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment_id,
            &course_id,
            &title,
            &description,
            &due_date,
            &max_score,
            &file_path,
            &file_name,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Assignment created successfully", "assignmentId": assignment_id }),
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
        "SELECT id, course_id, title, description, due_date, max_score, file_name
         FROM assignments
         WHERE course_id = ?
         ORDER BY due_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&course_id], |r| {
            Ok(json!({
                "assignmentId": r.get::<_, String>(0)?,
                "courseId": r.get::<_, String>(1)?,
                "title": r.get::<_, String>(2)?,
                "description": r.get::<_, Option<String>>(3)?,
                "dueDate": r.get::<_, String>(4)?,
                "maxScore": r.get::<_, f64>(5)?,
                "fileName": r.get::<_, Option<String>>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_download(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let assignment_id = match require_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(Option<String>, Option<String>)> = match conn
        .query_row(
            "SELECT file_path, file_name FROM assignments WHERE id = ?",
            [&assignment_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match row {
        Some((Some(path), Some(name))) => ok(
            &req.id,
            json!({ "filePath": path, "fileName": name }),
        ),
        Some(_) => err(&req.id, "not_found", "assignment has no attachment", None),
        None => err(&req.id, "not_found", "assignment not found", None),
    }
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let assignment_id = match require_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let content = optional_str(req, "content");

    // Enrollment is checked through the assignment's owning course, so an
    // unknown assignment also lands here.
    let enrolled: Option<i64> = match conn
        .query_row(
            "SELECT 1
             FROM enrollments e
             JOIN assignments a ON e.course_id = a.course_id
             WHERE a.id = ? AND e.student_id = ?",
            [&assignment_id, &student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if enrolled.is_none() {
        return err(
            &req.id,
            "forbidden",
            "student is not enrolled in this course",
            None,
        );
    }

    let due_raw: String = match conn.query_row(
        "SELECT due_date FROM assignments WHERE id = ?",
        [&assignment_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let now = chrono::Utc::now().naive_utc();
    let accepting = calc::parse_date_time(&due_raw)
        .map(|due| due > now)
        .unwrap_or(false);
    if !accepting {
        return err(
            &req.id,
            "bad_request",
            "assignment is past its due date",
            None,
        );
    }

    let submission_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO submissions(id, assignment_id, student_id, submission_date, content)
         VALUES(?, ?, ?, ?, ?)",
        (
            &submission_id,
            &assignment_id,
            &student_id,
            now_stamp(),
            &content,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "submissions" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Assignment submitted successfully", "submissionId": submission_id }),
    )
}

fn handle_list_submissions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let assignment_id = match require_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT s.id, s.student_id, s.submission_date, s.content, s.score, s.feedback,
                sp.first_name, sp.last_name, sp.email
         FROM submissions s
         JOIN student_profiles sp ON s.student_id = sp.id
         WHERE s.assignment_id = ?
         ORDER BY s.submission_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&assignment_id], |r| {
            Ok(json!({
                "submissionId": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "submissionDate": r.get::<_, String>(2)?,
                "content": r.get::<_, Option<String>>(3)?,
                "score": r.get::<_, Option<f64>>(4)?,
                "feedback": r.get::<_, Option<String>>(5)?,
                "firstName": r.get::<_, String>(6)?,
                "lastName": r.get::<_, String>(7)?,
                "email": r.get::<_, String>(8)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(submissions) => ok(&req.id, json!({ "submissions": submissions })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let submission_id = match require_str(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match require_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = optional_str(req, "feedback");

    match conn.execute(
        "UPDATE submissions SET score = ?, feedback = ? WHERE id = ?",
        (&score, &feedback, &submission_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "submission not found", None),
        Ok(_) => ok(&req.id, json!({ "message": "Assignment graded successfully" })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut stmt = match conn.prepare(
        "SELECT a.max_score, s.score
         FROM assignments a
         LEFT JOIN submissions s
           ON a.id = s.assignment_id AND s.student_id = ?
         WHERE a.course_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let outcomes = stmt
        .query_map([&student_id, &course_id], |r| {
            Ok(AssignmentOutcome {
                max_score: r.get(0)?,
                score: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match outcomes {
        Ok(outcomes) => {
            let summary = calc::course_progress(outcomes);
            ok(
                &req.id,
                json!({
                    "totalAssignments": summary.total_assignments,
                    "completedAssignments": summary.completed_assignments,
                    "progressPercentage": summary.progress_percentage,
                    "averageScore": summary.average_score
                }),
            )
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(handle_create(state, req)),
        "assignments.listForCourse" => Some(handle_list_for_course(state, req)),
        "assignments.download" => Some(handle_download(state, req)),
        "assignments.submit" => Some(handle_submit(state, req)),
        "assignments.listSubmissions" => Some(handle_list_submissions(state, req)),
        "assignments.grade" => Some(handle_grade(state, req)),
        "assignments.progress" => Some(handle_progress(state, req)),
        _ => None,
    }
}
