use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{now_stamp, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn mentor_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "email": r.get::<_, String>(0)?,
        "fullName": r.get::<_, String>(1)?,
        "expertise": r.get::<_, String>(2)?,
        "experienceYears": r.get::<_, i64>(3)?,
        "rate": r.get::<_, f64>(4)?,
        "bio": r.get::<_, Option<String>>(5)?,
        "linkedin": r.get::<_, Option<String>>(6)?,
        "github": r.get::<_, Option<String>>(7)?
    }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT email, full_name, expertise, experience_years, rate, bio, linkedin, github
         FROM mentors
         ORDER BY full_name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| mentor_row_json(r))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(mentors) => ok(&req.id, json!({ "mentors": mentors })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    // Upsert keyed on student_email: a student has at most one active mentor,
    // and re-assigning replaces the previous relationship.
    if let Err(e) = conn.execute(
        "INSERT INTO mentor_assignments(student_email, mentor_email, assignment_date)
         VALUES(?, ?, ?)
         ON CONFLICT(student_email) DO UPDATE SET
           mentor_email = excluded.mentor_email,
           assignment_date = excluded.assignment_date",
        (&student_email, &mentor_email, now_stamp()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "mentor_assignments" })),
        );
    }

    ok(&req.id, json!({ "message": "Mentor assigned successfully" }))
}

fn handle_unassign(state: &mut AppState, req: &Request) -> serde_json::Value {
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
        "DELETE FROM mentor_assignments WHERE student_email = ? AND mentor_email = ?",
        [&student_email, &mentor_email],
    ) {
        Ok(0) => err(&req.id, "not_found", "mentor assignment not found", None),
        Ok(_) => ok(
            &req.id,
            json!({
                "message": "Mentor assignment removed successfully",
                "studentEmail": student_email,
                "mentorEmail": mentor_email
            }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_assigned_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_email = match require_str(req, "studentEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT m.email, m.full_name, m.expertise, m.experience_years, m.rate,
                m.bio, m.linkedin, m.github, ma.assignment_date
         FROM mentors m
         JOIN mentor_assignments ma ON m.email = ma.mentor_email
         WHERE ma.student_email = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&student_email], |r| {
            let mut mentor = mentor_row_json(r)?;
            mentor["assignmentDate"] = json!(r.get::<_, String>(8)?);
            Ok(mentor)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(mentors) => ok(&req.id, json!({ "mentors": mentors })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_for_mentor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mentor_email = match require_str(req, "mentorEmail") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT sp.id, sp.first_name, sp.last_name, sp.email, sp.phone_number,
                sp.education_level, ma.assignment_date
         FROM mentor_assignments ma
         JOIN student_profiles sp ON ma.student_email = sp.email
         WHERE ma.mentor_email = ?
         ORDER BY ma.assignment_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&mentor_email], |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "firstName": r.get::<_, String>(1)?,
                "lastName": r.get::<_, String>(2)?,
                "email": r.get::<_, String>(3)?,
                "phoneNumber": r.get::<_, String>(4)?,
                "educationLevel": r.get::<_, String>(5)?,
                "assignmentDate": r.get::<_, String>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "mentors.list" => Some(handle_list(state, req)),
        "mentors.assign" => Some(handle_assign(state, req)),
        "mentors.unassign" => Some(handle_unassign(state, req)),
        "mentors.assignedForStudent" => Some(handle_assigned_for_student(state, req)),
        "mentors.studentsForMentor" => Some(handle_students_for_mentor(state, req)),
        _ => None,
    }
}
