use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "registrar.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            code TEXT PRIMARY KEY COLLATE NOCASE,
            name TEXT NOT NULL,
            units INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY COLLATE NOCASE,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS section_members(
            section_id TEXT NOT NULL COLLATE NOCASE,
            student_id TEXT NOT NULL COLLATE NOCASE,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(section_id, student_id),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_section_members_student ON section_members(student_id)",
        [],
    )?;

    // Key columns compare case-insensitively, matching how ids and terms are typed in by staff.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL COLLATE NOCASE,
            subject_code TEXT NOT NULL COLLATE NOCASE,
            subject_name TEXT NOT NULL,
            units INTEGER,
            letter_grade TEXT,
            numeric_grade REAL,
            gpa REAL,
            academic_year TEXT NOT NULL COLLATE NOCASE,
            semester TEXT NOT NULL COLLATE NOCASE,
            is_released INTEGER NOT NULL DEFAULT 0,
            remarks TEXT,
            updated_at TEXT,
            UNIQUE(student_id, subject_code, academic_year, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_grades_student ON student_grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_grades_term ON student_grades(student_id, academic_year, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_entries(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL COLLATE NOCASE,
            section_id TEXT COLLATE NOCASE,
            subject_code TEXT NOT NULL COLLATE NOCASE,
            description TEXT,
            units INTEGER,
            day_time TEXT NOT NULL COLLATE NOCASE,
            room TEXT NOT NULL COLLATE NOCASE,
            faculty_id TEXT COLLATE NOCASE,
            academic_year TEXT NOT NULL COLLATE NOCASE,
            semester TEXT NOT NULL COLLATE NOCASE,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_entries_student_term
         ON schedule_entries(student_id, academic_year, semester)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_entries_faculty_term
         ON schedule_entries(faculty_id, academic_year, semester)",
        [],
    )?;
    // Storage-level backstop for the two double-booking rules.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_schedule_entries_student_slot
         ON schedule_entries(student_id, academic_year, semester, day_time, room)",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_schedule_entries_faculty_slot
         ON schedule_entries(faculty_id, academic_year, semester, day_time)
         WHERE faculty_id IS NOT NULL AND faculty_id <> ''",
        [],
    )?;

    Ok(())
}
