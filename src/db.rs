use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("tutord.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS login(
            email TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_profiles(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            dob TEXT NOT NULL,
            education_level TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_profiles_email ON student_profiles(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_profiles(
            email TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone_number TEXT,
            gender TEXT NOT NULL,
            date_of_birth TEXT,
            address TEXT,
            subjects_taught TEXT,
            qualification TEXT NOT NULL,
            years_of_experience INTEGER,
            bio TEXT
        )",
        [],
    )?;

    // Mentor directory doubles as the mentor profile store. The platform keeps
    // one row per mentor keyed by email; rate is per hour.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS mentors(
            email TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            expertise TEXT NOT NULL,
            experience_years INTEGER NOT NULL,
            rate REAL NOT NULL,
            bio TEXT,
            linkedin TEXT,
            github TEXT,
            education_level TEXT
        )",
        [],
    )?;
    ensure_mentors_education_level(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            duration_hours INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            teacher_email TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            enrollment_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Pending',
            FOREIGN KEY(student_id) REFERENCES student_profiles(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(student_id, course_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_schedules(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            class_date TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            meeting_link TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_schedules_course ON class_schedules(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            max_score REAL NOT NULL,
            file_path TEXT,
            file_name TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            submission_date TEXT NOT NULL,
            content TEXT,
            score REAL,
            feedback TEXT,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id),
            FOREIGN KEY(student_id) REFERENCES student_profiles(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assignment ON submissions(assignment_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_materials(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            upload_date TEXT NOT NULL,
            description TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_materials_course ON course_materials(course_id)",
        [],
    )?;

    // One active mentor per student: student_email is the primary key, so
    // mentors.assign is an upsert that replaces the previous relationship.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS mentor_assignments(
            student_email TEXT PRIMARY KEY,
            mentor_email TEXT NOT NULL,
            assignment_date TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mentor_assignments_mentor ON mentor_assignments(mentor_email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS mentor_schedules(
            id TEXT PRIMARY KEY,
            mentor_email TEXT NOT NULL,
            student_email TEXT NOT NULL,
            class_date TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            description TEXT,
            meeting_link TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mentor_schedules_mentor ON mentor_schedules(mentor_email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mentor_schedules_student ON mentor_schedules(student_email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scheduled_meetings(
            id TEXT PRIMARY KEY,
            mentor_email TEXT NOT NULL,
            student_email TEXT NOT NULL,
            meeting_date TEXT NOT NULL,
            meeting_link TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scheduled_meetings_pair ON scheduled_meetings(mentor_email, student_email)",
        [],
    )?;

    Ok(conn)
}

fn ensure_mentors_education_level(conn: &Connection) -> anyhow::Result<()> {
    // Early workspaces predate the education_level column on the directory.
    if table_has_column(conn, "mentors", "education_level")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE mentors ADD COLUMN education_level TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
