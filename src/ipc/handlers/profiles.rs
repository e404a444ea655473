use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, require_f64, require_i64, require_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_upsert_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let first_name = match require_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match require_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let phone_number = match require_str(req, "phoneNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let dob = match require_str(req, "dob") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let education_level = match require_str(req, "educationLevel") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // The generated id survives re-upserts so enrollments and submissions keep
    // pointing at the same student.
    let id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO student_profiles
           (id, email, first_name, last_name, phone_number, dob, education_level)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name,
           phone_number = excluded.phone_number,
           dob = excluded.dob,
           education_level = excluded.education_level",
        (&id, &email, &first_name, &last_name, &phone_number, &dob, &education_level),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "student_profiles" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Profile setup completed successfully" }),
    )
}

fn handle_upsert_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match require_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let gender = match require_str(req, "gender") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let qualification = match require_str(req, "qualification") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let phone_number = optional_str(req, "phoneNumber");
    let date_of_birth = optional_str(req, "dateOfBirth");
    let address = optional_str(req, "address");
    let subjects_taught = optional_str(req, "subjectsTaught");
    let years_of_experience = req.params.get("yearsOfExperience").and_then(|v| v.as_i64());
    let bio = optional_str(req, "bio");

    if let Err(e) = conn.execute(
        "INSERT INTO teacher_profiles
           (email, name, phone_number, gender, date_of_birth, address,
            subjects_taught, qualification, years_of_experience, bio)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           name = excluded.name,
           phone_number = excluded.phone_number,
           gender = excluded.gender,
           date_of_birth = excluded.date_of_birth,
           address = excluded.address,
           subjects_taught = excluded.subjects_taught,
           qualification = excluded.qualification,
           years_of_experience = excluded.years_of_experience,
           bio = excluded.bio",
        (
            &email,
            &name,
            &phone_number,
            &gender,
            &date_of_birth,
            &address,
            &subjects_taught,
            &qualification,
            &years_of_experience,
            &bio,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teacher_profiles" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Teacher profile setup completed successfully" }),
    )
}

fn handle_upsert_mentor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let full_name = match require_str(req, "fullName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let expertise = match require_str(req, "expertise") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let experience_years = match require_i64(req, "experienceYears") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rate = match require_f64(req, "rate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bio = optional_str(req, "bio");
    let linkedin = optional_str(req, "linkedin");
    let github = optional_str(req, "github");
    let education_level = optional_str(req, "educationLevel");

    if let Err(e) = conn.execute(
        "INSERT INTO mentors
           (email, full_name, expertise, experience_years, rate, bio, linkedin,
            github, education_level)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           full_name = excluded.full_name,
           expertise = excluded.expertise,
           experience_years = excluded.experience_years,
           rate = excluded.rate,
           bio = excluded.bio,
           linkedin = excluded.linkedin,
           github = excluded.github,
           education_level = excluded.education_level",
        (
            &email,
            &full_name,
            &expertise,
            &experience_years,
            &rate,
            &bio,
            &linkedin,
            &github,
            &education_level,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "mentors" })),
        );
    }

    ok(
        &req.id,
        json!({ "message": "Mentor profile setup completed successfully" }),
    )
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let role = match require_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = match role.as_str() {
        "Student" => conn
            .query_row(
                "SELECT id, email, first_name, last_name, phone_number, dob, education_level
                 FROM student_profiles WHERE email = ?",
                [&email],
                |r| {
                    Ok(json!({
                        "id": r.get::<_, String>(0)?,
                        "email": r.get::<_, String>(1)?,
                        "firstName": r.get::<_, String>(2)?,
                        "lastName": r.get::<_, String>(3)?,
                        "phoneNumber": r.get::<_, String>(4)?,
                        "dob": r.get::<_, String>(5)?,
                        "educationLevel": r.get::<_, String>(6)?
                    }))
                },
            )
            .optional(),
        "Teacher" => conn
            .query_row(
                "SELECT email, name, phone_number, gender, date_of_birth, address,
                        subjects_taught, qualification, years_of_experience, bio
                 FROM teacher_profiles WHERE email = ?",
                [&email],
                |r| {
                    Ok(json!({
                        "email": r.get::<_, String>(0)?,
                        "name": r.get::<_, String>(1)?,
                        "phoneNumber": r.get::<_, Option<String>>(2)?,
                        "gender": r.get::<_, String>(3)?,
                        "dateOfBirth": r.get::<_, Option<String>>(4)?,
                        "address": r.get::<_, Option<String>>(5)?,
                        "subjectsTaught": r.get::<_, Option<String>>(6)?,
                        "qualification": r.get::<_, String>(7)?,
                        "yearsOfExperience": r.get::<_, Option<i64>>(8)?,
                        "bio": r.get::<_, Option<String>>(9)?
                    }))
                },
            )
            .optional(),
        "Mentor" => conn
            .query_row(
                "SELECT email, full_name, expertise, experience_years, rate, bio,
                        linkedin, github, education_level
                 FROM mentors WHERE email = ?",
                [&email],
                |r| {
                    Ok(json!({
                        "email": r.get::<_, String>(0)?,
                        "fullName": r.get::<_, String>(1)?,
                        "expertise": r.get::<_, String>(2)?,
                        "experienceYears": r.get::<_, i64>(3)?,
                        "rate": r.get::<_, f64>(4)?,
                        "bio": r.get::<_, Option<String>>(5)?,
                        "linkedin": r.get::<_, Option<String>>(6)?,
                        "github": r.get::<_, Option<String>>(7)?,
                        "educationLevel": r.get::<_, Option<String>>(8)?
                    }))
                },
            )
            .optional(),
        other => {
            return err(
                &req.id,
                "bad_request",
                format!("unknown role: {}", other),
                None,
            )
        }
    };

    match row {
        Ok(Some(profile)) => ok(&req.id, json!({ "exists": true, "profile": profile })),
        Ok(None) => err(&req.id, "not_found", "profile not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profiles.upsertStudent" => Some(handle_upsert_student(state, req)),
        "profiles.upsertTeacher" => Some(handle_upsert_teacher(state, req)),
        "profiles.upsertMentor" => Some(handle_upsert_mentor(state, req)),
        "profiles.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
