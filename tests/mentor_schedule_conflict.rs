use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_tutord");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tutord");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

const MENTOR_EMAIL: &str = "knuth@example.com";
const STUDENT_EMAIL: &str = "student@example.com";

fn seed_mentor_pair(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s2",
        "profiles.upsertMentor",
        json!({
            "email": MENTOR_EMAIL,
            "fullName": "Don Knuth",
            "expertise": "Algorithms",
            "experienceYears": 50,
            "rate": 120.0,
            "bio": "Literate programming"
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s3",
        "profiles.upsertStudent",
        json!({
            "firstName": "Sam",
            "lastName": "Student",
            "email": STUDENT_EMAIL,
            "phoneNumber": "555-0000",
            "dob": "2004-01-01",
            "educationLevel": "Undergraduate"
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s4",
        "mentors.assign",
        json!({ "studentEmail": STUDENT_EMAIL, "mentorEmail": MENTOR_EMAIL }),
    );
}

fn schedule(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_date: &str,
    duration_minutes: i64,
) -> serde_json::Value {
    request(
        stdin,
        reader,
        id,
        "mentorSchedules.create",
        json!({
            "mentorEmail": MENTOR_EMAIL,
            "studentEmail": STUDENT_EMAIL,
            "classDate": class_date,
            "durationMinutes": duration_minutes,
            "description": "Session"
        }),
    )
}

#[test]
fn overlapping_session_is_rejected_but_back_to_back_is_allowed() {
    let workspace = temp_dir("tutord-mentor-conflict");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_mentor_pair(&mut stdin, &mut reader, &workspace);

    let first = schedule(&mut stdin, &mut reader, "1", "2099-03-01 10:00:00", 60);
    assert_eq!(first.get("ok").and_then(|v| v.as_bool()), Some(true));

    // 10:30-11:30 sits inside the 10:00-11:00 session.
    let clash = schedule(&mut stdin, &mut reader, "2", "2099-03-01 10:30:00", 60);
    assert_eq!(clash.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&clash), Some("conflict"));

    // 11:00-12:00 starts exactly where the first one ends.
    let adjacent = schedule(&mut stdin, &mut reader, "3", "2099-03-01 11:00:00", 60);
    assert_eq!(
        adjacent.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "back-to-back session was rejected: {}",
        adjacent
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "mentorSchedules.list",
        json!({ "mentorEmail": MENTOR_EMAIL, "studentEmail": STUDENT_EMAIL }),
    );
    let schedules = listed
        .get("schedules")
        .and_then(|v| v.as_array())
        .expect("schedules array");
    assert_eq!(schedules.len(), 2);
}

#[test]
fn scheduling_without_mentor_relationship_is_forbidden() {
    let workspace = temp_dir("tutord-mentor-norel");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = schedule(&mut stdin, &mut reader, "1", "2099-03-01 10:00:00", 60);
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&resp), Some("forbidden"));
}

#[test]
fn reschedule_skips_own_row_but_honors_other_sessions() {
    let workspace = temp_dir("tutord-mentor-resched");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_mentor_pair(&mut stdin, &mut reader, &workspace);

    let first = schedule(&mut stdin, &mut reader, "1", "2099-03-02 09:00:00", 60);
    let schedule_id = first
        .get("result")
        .and_then(|r| r.get("scheduleId"))
        .and_then(|v| v.as_str())
        .expect("scheduleId")
        .to_string();
    let second = schedule(&mut stdin, &mut reader, "2", "2099-03-02 14:00:00", 60);
    assert_eq!(second.get("ok").and_then(|v| v.as_bool()), Some(true));

    // Nudging a session within its own original slot is fine.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "mentorSchedules.update",
        json!({
            "scheduleId": schedule_id,
            "mentorEmail": MENTOR_EMAIL,
            "classDate": "2099-03-02 09:30:00",
            "durationMinutes": 60
        }),
    );

    // Moving it onto the afternoon session is not.
    let clash = request(
        &mut stdin,
        &mut reader,
        "4",
        "mentorSchedules.update",
        json!({
            "scheduleId": schedule_id,
            "mentorEmail": MENTOR_EMAIL,
            "classDate": "2099-03-02 14:30:00",
            "durationMinutes": 60
        }),
    );
    assert_eq!(clash.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&clash), Some("conflict"));
}

#[test]
fn cancel_requires_the_owning_mentor() {
    let workspace = temp_dir("tutord-mentor-cancel");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_mentor_pair(&mut stdin, &mut reader, &workspace);

    let first = schedule(&mut stdin, &mut reader, "1", "2099-03-03 10:00:00", 45);
    let schedule_id = first
        .get("result")
        .and_then(|r| r.get("scheduleId"))
        .and_then(|v| v.as_str())
        .expect("scheduleId")
        .to_string();

    let wrong = request(
        &mut stdin,
        &mut reader,
        "2",
        "mentorSchedules.cancel",
        json!({ "scheduleId": schedule_id, "mentorEmail": "someone.else@example.com" }),
    );
    assert_eq!(wrong.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&wrong), Some("not_found"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "mentorSchedules.cancel",
        json!({ "scheduleId": schedule_id, "mentorEmail": MENTOR_EMAIL }),
    );
}

#[test]
fn iso_style_dates_are_stored_canonically_and_stay_upcoming() {
    let workspace = temp_dir("tutord-mentor-isodate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_mentor_pair(&mut stdin, &mut reader, &workspace);

    let created = schedule(&mut stdin, &mut reader, "1", "2099-03-04T10:00:00", 60);
    assert_eq!(created.get("ok").and_then(|v| v.as_bool()), Some(true));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "mentorSchedules.list",
        json!({ "mentorEmail": MENTOR_EMAIL, "studentEmail": STUDENT_EMAIL }),
    );
    let schedules = listed
        .get("schedules")
        .and_then(|v| v.as_array())
        .expect("schedules array");
    assert_eq!(schedules.len(), 1);
    assert_eq!(
        schedules[0].get("classDate").and_then(|v| v.as_str()),
        Some("2099-03-04 10:00:00")
    );

    // The canonical form compares correctly against now in the upcoming scan.
    let upcoming = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "mentorSchedules.upcomingForStudent",
        json!({ "studentEmail": STUDENT_EMAIL }),
    );
    let classes = upcoming
        .get("classes")
        .and_then(|v| v.as_array())
        .expect("classes array");
    assert_eq!(classes.len(), 1);
    assert_eq!(
        classes[0].get("classDate").and_then(|v| v.as_str()),
        Some("2099-03-04 10:00:00")
    );
}
