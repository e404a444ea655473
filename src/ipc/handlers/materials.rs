use crate::files;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{course_exists, enrollment_gate, now_stamp, optional_str, require_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

fn handle_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let source_path = match require_str(req, "sourcePath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = optional_str(req, "description");

    match course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let stored = match files::store_pdf_upload(&workspace, &PathBuf::from(&source_path), "material")
    {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_request", e.to_string(), None),
    };

    let material_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO course_materials
           (id, course_id, file_name, file_path, upload_date, description)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &material_id,
            &course_id,
            &stored.file_name,
            stored.stored_path.to_string_lossy().to_string(),
            now_stamp(),
            &description,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "course_materials" })),
        );
    }

    ok(
        &req.id,
        json!({
            "message": "Course material uploaded successfully",
            "materialId": material_id,
            "fileName": stored.file_name
        }),
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
        "SELECT id, course_id, file_name, upload_date, description
         FROM course_materials
         WHERE course_id = ?
         ORDER BY upload_date DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&course_id], |r| {
            Ok(json!({
                "materialId": r.get::<_, String>(0)?,
                "courseId": r.get::<_, String>(1)?,
                "fileName": r.get::<_, String>(2)?,
                "uploadDate": r.get::<_, String>(3)?,
                "description": r.get::<_, Option<String>>(4)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(materials) => ok(&req.id, json!({ "materials": materials })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_download(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let material_id = match require_str(req, "materialId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(String, String, String)> = match conn
        .query_row(
            "SELECT course_id, file_path, file_name FROM course_materials WHERE id = ?",
            [&material_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((course_id, file_path, file_name)) = row else {
        return err(&req.id, "not_found", "material not found", None);
    };

    // Downloads are gated on enrollment in the owning course.
    if let Err(resp) = enrollment_gate(conn, req, &course_id) {
        return resp;
    }

    ok(
        &req.id,
        json!({ "filePath": file_path, "fileName": file_name }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "materials.upload" => Some(handle_upload(state, req)),
        "materials.listForCourse" => Some(handle_list_for_course(state, req)),
        "materials.download" => Some(handle_download(state, req)),
        _ => None,
    }
}
