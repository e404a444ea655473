use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};

const ROLES: [&str; 3] = ["Student", "Teacher", "Mentor"];

// Credentials are stored hashed; login is hash-and-compare. The platform never
// returns stored hashes to the caller.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let password = match require_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match require_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !ROLES.contains(&role.as_str()) {
        return err(
            &req.id,
            "bad_request",
            format!("role must be one of {}", ROLES.join(", ")),
            None,
        );
    }

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM login WHERE email = ?", [&email], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_some() {
        return err(&req.id, "conflict", "an account with this email already exists", None);
    }

    if let Err(e) = conn.execute(
        "INSERT INTO login(email, name, password_hash, role) VALUES(?, ?, ?, ?)",
        (&email, &name, hash_password(&password), &role),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "login" })),
        );
    }

    ok(&req.id, json!({ "message": "Registered successfully" }))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match require_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(String, String)> = match conn
        .query_row(
            "SELECT password_hash, role FROM login WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match row {
        Some((stored_hash, role)) if stored_hash == hash_password(&password) => ok(
            &req.id,
            json!({
                "message": "Login successful",
                "role": role,
                "email": email
            }),
        ),
        _ => err(&req.id, "unauthorized", "invalid email or password", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signup" => Some(handle_signup(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
