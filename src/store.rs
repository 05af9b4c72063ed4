use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::error::EngineResult;
use crate::grades::{GradeKey, GradeRecord, LetterGrade};
use crate::schedule::ScheduleEntry;

const GRADE_COLUMNS: &str = "id, student_id, subject_code, subject_name, units, letter_grade,
     numeric_grade, gpa, academic_year, semester, is_released, remarks, updated_at";

const SCHEDULE_COLUMNS: &str = "id, student_id, section_id, subject_code, description, units,
     day_time, room, faculty_id, academic_year, semester, created_at";

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// IMMEDIATE takes the write lock before any reads, so a check followed by a
/// write cannot interleave with another writer on the same workspace.
pub fn write_tx(conn: &Connection) -> EngineResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    let letter: Option<String> = r.get(5)?;
    Ok(GradeRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_code: r.get(2)?,
        subject_name: r.get(3)?,
        units: r.get(4)?,
        letter_grade: letter.as_deref().and_then(LetterGrade::parse),
        numeric_grade: r.get(6)?,
        gpa: r.get(7)?,
        academic_year: r.get(8)?,
        semester: r.get(9)?,
        is_released: r.get::<_, i64>(10)? != 0,
        remarks: r.get(11)?,
        updated_at: r.get(12)?,
    })
}

fn query_grades(conn: &Connection, sql: &str, params: Vec<Value>) -> EngineResult<Vec<GradeRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_grade_by_id(conn: &Connection, id: &str) -> EngineResult<Option<GradeRecord>> {
    let sql = format!("SELECT {} FROM student_grades WHERE id = ?", GRADE_COLUMNS);
    Ok(conn.query_row(&sql, [id], grade_from_row).optional()?)
}

pub fn find_grade_by_key(conn: &Connection, key: &GradeKey) -> EngineResult<Option<GradeRecord>> {
    let sql = format!(
        "SELECT {} FROM student_grades
         WHERE student_id = ? AND subject_code = ? AND academic_year = ? AND semester = ?",
        GRADE_COLUMNS
    );
    Ok(conn
        .query_row(
            &sql,
            (
                &key.student_id,
                &key.subject_code,
                &key.academic_year,
                &key.semester,
            ),
            grade_from_row,
        )
        .optional()?)
}

pub fn grades_for_student(conn: &Connection, student_id: &str) -> EngineResult<Vec<GradeRecord>> {
    let sql = format!(
        "SELECT {} FROM student_grades
         WHERE student_id = ?
         ORDER BY academic_year, semester, subject_code",
        GRADE_COLUMNS
    );
    query_grades(conn, &sql, vec![Value::Text(student_id.to_string())])
}

pub fn grades_for_student_term(
    conn: &Connection,
    student_id: &str,
    academic_year: &str,
    semester: &str,
    released_only: bool,
) -> EngineResult<Vec<GradeRecord>> {
    let sql = format!(
        "SELECT {} FROM student_grades
         WHERE student_id = ? AND academic_year = ? AND semester = ?{}
         ORDER BY subject_code",
        GRADE_COLUMNS,
        if released_only { " AND is_released = 1" } else { "" }
    );
    query_grades(
        conn,
        &sql,
        vec![
            Value::Text(student_id.to_string()),
            Value::Text(academic_year.to_string()),
            Value::Text(semester.to_string()),
        ],
    )
}

/// Grades of the given students for one subject and term.
pub fn grades_for_students_subject_term(
    conn: &Connection,
    student_ids: &[String],
    subject_code: &str,
    academic_year: &str,
    semester: &str,
) -> EngineResult<Vec<GradeRecord>> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM student_grades
         WHERE subject_code = ? AND academic_year = ? AND semester = ?
           AND student_id IN ({})
         ORDER BY student_id",
        GRADE_COLUMNS,
        placeholders(student_ids.len())
    );
    let mut params = vec![
        Value::Text(subject_code.to_string()),
        Value::Text(academic_year.to_string()),
        Value::Text(semester.to_string()),
    ];
    params.extend(student_ids.iter().map(|s| Value::Text(s.clone())));
    query_grades(conn, &sql, params)
}

pub fn grades_for_students(conn: &Connection, student_ids: &[String]) -> EngineResult<Vec<GradeRecord>> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM student_grades
         WHERE student_id IN ({})
         ORDER BY academic_year, semester, subject_code",
        GRADE_COLUMNS,
        placeholders(student_ids.len())
    );
    query_grades(
        conn,
        &sql,
        student_ids.iter().map(|s| Value::Text(s.clone())).collect(),
    )
}

pub fn insert_grade(conn: &Connection, g: &GradeRecord) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO student_grades(
            id, student_id, subject_code, subject_name, units, letter_grade,
            numeric_grade, gpa, academic_year, semester, is_released, remarks, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &g.id,
            &g.student_id,
            &g.subject_code,
            &g.subject_name,
            g.units,
            g.letter_grade.map(LetterGrade::code),
            g.numeric_grade,
            g.gpa,
            &g.academic_year,
            &g.semester,
            g.is_released as i64,
            &g.remarks,
            &g.updated_at,
        ),
    )?;
    Ok(())
}

pub fn update_grade(conn: &Connection, g: &GradeRecord) -> EngineResult<()> {
    conn.execute(
        "UPDATE student_grades SET
            subject_name = ?, units = ?, letter_grade = ?, numeric_grade = ?, gpa = ?,
            is_released = ?, remarks = ?, updated_at = ?
         WHERE id = ?",
        (
            &g.subject_name,
            g.units,
            g.letter_grade.map(LetterGrade::code),
            g.numeric_grade,
            g.gpa,
            g.is_released as i64,
            &g.remarks,
            &g.updated_at,
            &g.id,
        ),
    )?;
    Ok(())
}

pub fn set_released_by_key(conn: &Connection, key: &GradeKey, released: bool) -> EngineResult<usize> {
    let changed = conn.execute(
        "UPDATE student_grades SET is_released = ?, updated_at = ?
         WHERE student_id = ? AND subject_code = ? AND academic_year = ? AND semester = ?",
        (
            released as i64,
            now_stamp(),
            &key.student_id,
            &key.subject_code,
            &key.academic_year,
            &key.semester,
        ),
    )?;
    Ok(changed)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub name: String,
    pub units: Option<i64>,
}

pub fn find_subject(conn: &Connection, code: &str) -> EngineResult<Option<Subject>> {
    Ok(conn
        .query_row(
            "SELECT code, name, units FROM subjects WHERE code = ?",
            [code],
            |r| {
                Ok(Subject {
                    code: r.get(0)?,
                    name: r.get(1)?,
                    units: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn upsert_subject(conn: &Connection, s: &Subject) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO subjects(code, name, units) VALUES(?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET name = excluded.name, units = excluded.units",
        (&s.code, &s.name, s.units),
    )?;
    Ok(())
}

/// Roster of a section in stored order, or `None` when the section does not exist.
pub fn section_members(conn: &Connection, section_id: &str) -> EngineResult<Option<Vec<String>>> {
    let exists: Option<String> = conn
        .query_row("SELECT id FROM sections WHERE id = ?", [section_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }
    let mut stmt = conn.prepare(
        "SELECT student_id FROM section_members WHERE section_id = ? ORDER BY sort_order",
    )?;
    let ids = stmt
        .query_map([section_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(ids))
}

/// Replace a section and its roster.
pub fn upsert_section(
    conn: &Connection,
    section_id: &str,
    name: &str,
    student_ids: &[String],
) -> EngineResult<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO sections(id, name) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        (section_id, name),
    )?;
    tx.execute(
        "DELETE FROM section_members WHERE section_id = ?",
        [section_id],
    )?;
    let mut inserted = 0;
    for (i, sid) in student_ids.iter().enumerate() {
        inserted += tx.execute(
            "INSERT OR IGNORE INTO section_members(section_id, student_id, sort_order)
             VALUES(?, ?, ?)",
            (section_id, sid, i as i64),
        )?;
    }
    tx.commit()?;
    Ok(inserted)
}

fn schedule_from_row(r: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: r.get(0)?,
        student_id: r.get(1)?,
        section_id: r.get(2)?,
        subject_code: r.get(3)?,
        description: r.get(4)?,
        units: r.get(5)?,
        day_time: r.get(6)?,
        room: r.get(7)?,
        faculty_id: r.get(8)?,
        academic_year: r.get(9)?,
        semester: r.get(10)?,
        created_at: r.get(11)?,
    })
}

fn query_schedules(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> EngineResult<Vec<ScheduleEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), schedule_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_schedule_by_id(conn: &Connection, id: &str) -> EngineResult<Option<ScheduleEntry>> {
    let sql = format!("SELECT {} FROM schedule_entries WHERE id = ?", SCHEDULE_COLUMNS);
    Ok(conn.query_row(&sql, [id], schedule_from_row).optional()?)
}

pub fn schedules_for_student_term(
    conn: &Connection,
    student_id: &str,
    academic_year: &str,
    semester: &str,
) -> EngineResult<Vec<ScheduleEntry>> {
    let sql = format!(
        "SELECT {} FROM schedule_entries
         WHERE student_id = ? AND academic_year = ? AND semester = ?
         ORDER BY day_time, room",
        SCHEDULE_COLUMNS
    );
    query_schedules(
        conn,
        &sql,
        vec![
            Value::Text(student_id.to_string()),
            Value::Text(academic_year.to_string()),
            Value::Text(semester.to_string()),
        ],
    )
}

pub fn schedules_for_faculty_term(
    conn: &Connection,
    faculty_id: &str,
    academic_year: &str,
    semester: &str,
) -> EngineResult<Vec<ScheduleEntry>> {
    let sql = format!(
        "SELECT {} FROM schedule_entries
         WHERE faculty_id = ? AND academic_year = ? AND semester = ?
         ORDER BY day_time, room",
        SCHEDULE_COLUMNS
    );
    query_schedules(
        conn,
        &sql,
        vec![
            Value::Text(faculty_id.to_string()),
            Value::Text(academic_year.to_string()),
            Value::Text(semester.to_string()),
        ],
    )
}

pub fn schedules_for_students(
    conn: &Connection,
    student_ids: &[String],
) -> EngineResult<Vec<ScheduleEntry>> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM schedule_entries
         WHERE student_id IN ({})
         ORDER BY academic_year, semester, student_id, day_time",
        SCHEDULE_COLUMNS,
        placeholders(student_ids.len())
    );
    query_schedules(
        conn,
        &sql,
        student_ids.iter().map(|s| Value::Text(s.clone())).collect(),
    )
}

pub fn insert_schedule(conn: &Connection, e: &ScheduleEntry) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO schedule_entries(
            id, student_id, section_id, subject_code, description, units,
            day_time, room, faculty_id, academic_year, semester, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &e.id,
            &e.student_id,
            &e.section_id,
            &e.subject_code,
            &e.description,
            e.units,
            &e.day_time,
            &e.room,
            &e.faculty_id,
            &e.academic_year,
            &e.semester,
            &e.created_at,
        ),
    )?;
    Ok(())
}

pub fn update_schedule(conn: &Connection, e: &ScheduleEntry) -> EngineResult<usize> {
    let changed = conn.execute(
        "UPDATE schedule_entries SET
            student_id = ?, section_id = ?, subject_code = ?, description = ?, units = ?,
            day_time = ?, room = ?, faculty_id = ?, academic_year = ?, semester = ?
         WHERE id = ?",
        (
            &e.student_id,
            &e.section_id,
            &e.subject_code,
            &e.description,
            e.units,
            &e.day_time,
            &e.room,
            &e.faculty_id,
            &e.academic_year,
            &e.semester,
            &e.id,
        ),
    )?;
    Ok(changed)
}

pub fn delete_schedule(conn: &Connection, id: &str) -> EngineResult<usize> {
    Ok(conn.execute("DELETE FROM schedule_entries WHERE id = ?", [id])?)
}
