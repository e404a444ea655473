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

const STUDENT_EMAIL: &str = "grace.hopper@example.com";

struct Seeded {
    course_id: String,
    student_id: String,
}

fn seed_enrolled_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) -> Seeded {
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
        "profiles.upsertStudent",
        json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": STUDENT_EMAIL,
            "phoneNumber": "555-0102",
            "dob": "2002-12-09",
            "educationLevel": "Graduate"
        }),
    );
    let profile = request_ok(
        stdin,
        reader,
        "s3",
        "profiles.get",
        json!({ "role": "Student", "email": STUDENT_EMAIL }),
    );
    let student_id = profile
        .get("profile")
        .and_then(|p| p.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let created = request_ok(
        stdin,
        reader,
        "s4",
        "courses.create",
        json!({
            "title": "Compilers",
            "description": "From COBOL up",
            "category": "Computing",
            "durationHours": 30,
            "startDate": "2025-01-15",
            "endDate": "2025-06-15",
            "teacherEmail": "teacher@example.com"
        }),
    );
    let course_id = created
        .get("courseId")
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();

    let _ = request_ok(
        stdin,
        reader,
        "s5",
        "enrollments.create",
        json!({ "studentEmail": STUDENT_EMAIL, "courseId": course_id }),
    );

    Seeded {
        course_id,
        student_id,
    }
}

fn create_assignment(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    course_id: &str,
    title: &str,
    max_score: f64,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "assignments.create",
        json!({
            "courseId": course_id,
            "title": title,
            "dueDate": "2099-01-01 00:00:00",
            "maxScore": max_score
        }),
    );
    created
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignmentId")
        .to_string()
}

#[test]
fn progress_for_course_with_no_assignments_is_all_zero() {
    let workspace = temp_dir("tutord-progress-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_enrolled_student(&mut stdin, &mut reader, &workspace);

    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.progress",
        json!({ "courseId": seeded.course_id, "studentId": seeded.student_id }),
    );
    assert_eq!(progress.get("totalAssignments").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        progress.get("completedAssignments").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert_eq!(
        progress.get("progressPercentage").and_then(|v| v.as_f64()),
        Some(0.0)
    );
    assert_eq!(progress.get("averageScore").and_then(|v| v.as_f64()), Some(0.0));
}

#[test]
fn progress_counts_graded_submissions_and_averages_percentages() {
    let workspace = temp_dir("tutord-progress-graded");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_enrolled_student(&mut stdin, &mut reader, &workspace);

    let a1 = create_assignment(&mut stdin, &mut reader, "1", &seeded.course_id, "Essay", 100.0);
    let _a2 = create_assignment(&mut stdin, &mut reader, "2", &seeded.course_id, "Quiz", 50.0);

    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.submit",
        json!({
            "assignmentId": a1,
            "studentId": seeded.student_id,
            "content": "My essay"
        }),
    );
    let submission_id = submitted
        .get("submissionId")
        .and_then(|v| v.as_str())
        .expect("submissionId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.grade",
        json!({ "submissionId": submission_id, "score": 80, "feedback": "Solid" }),
    );

    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.progress",
        json!({ "courseId": seeded.course_id, "studentId": seeded.student_id }),
    );
    assert_eq!(progress.get("totalAssignments").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        progress.get("completedAssignments").and_then(|v| v.as_i64()),
        Some(1)
    );
    let pct = progress
        .get("progressPercentage")
        .and_then(|v| v.as_f64())
        .expect("progressPercentage");
    assert!((pct - 50.0).abs() < 1e-9);
    let avg = progress
        .get("averageScore")
        .and_then(|v| v.as_f64())
        .expect("averageScore");
    assert!((avg - 80.0).abs() < 1e-9);
}

#[test]
fn grading_unknown_submission_reports_not_found() {
    let workspace = temp_dir("tutord-progress-grade404");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = seed_enrolled_student(&mut stdin, &mut reader, &workspace);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.grade",
        json!({ "submissionId": "no-such-submission", "score": 10 }),
    );
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected error: {}",
        resp
    );
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_found")
    );
}
