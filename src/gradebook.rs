use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, RowRejection};
use crate::grades::{
    self, check_numeric_grade, check_units, lenient_f64, lenient_units, require_field,
    resolve_grade_pair, GradeDraft, GradeKey, GradeRecord, GradeStatistics, UNKNOWN_SUBJECT_NAME,
};
use crate::store;

/// Section + subject + term that a batch operation applies to.
#[derive(Debug, Clone)]
pub struct SectionScope {
    pub section_id: String,
    pub subject_code: String,
    pub academic_year: String,
    pub semester: String,
}

impl SectionScope {
    pub fn new(
        section_id: &str,
        subject_code: &str,
        academic_year: &str,
        semester: &str,
    ) -> EngineResult<Self> {
        Ok(Self {
            section_id: require_field("sectionId", section_id)?,
            subject_code: require_field("subjectCode", subject_code)?,
            academic_year: require_field("academicYear", academic_year)?,
            semester: require_field("semester", semester)?,
        })
    }

    fn key_for(&self, student_id: &str) -> GradeKey {
        GradeKey {
            student_id: student_id.to_string(),
            subject_code: self.subject_code.clone(),
            academic_year: self.academic_year.clone(),
            semester: self.semester.clone(),
        }
    }
}

fn roster(conn: &Connection, section_id: &str) -> EngineResult<Vec<String>> {
    store::section_members(conn, section_id)?
        .ok_or_else(|| EngineError::not_found("section", section_id))
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Upsert keyed by (student, subject, year, semester). Letter and numeric
/// grades are reconciled and gpa recomputed on every save.
pub fn save_grade(conn: &Connection, draft: GradeDraft) -> EngineResult<GradeRecord> {
    let key = draft.key()?;
    if let Some(u) = draft.units {
        check_units(u)?;
    }
    let has_grade = draft.numeric_grade.is_some()
        || non_blank(draft.letter_grade.as_deref()).is_some();
    let (letter, numeric) = resolve_grade_pair(draft.letter_grade.as_deref(), draft.numeric_grade)?;
    let subject_name = non_blank(draft.subject_name.as_deref());

    let tx = store::write_tx(conn)?;
    let record = match store::find_grade_by_key(&tx, &key)? {
        Some(mut g) => {
            if let Some(name) = subject_name {
                g.subject_name = name;
            }
            if draft.units.is_some() {
                g.units = draft.units;
            }
            if has_grade {
                g.letter_grade = letter;
                g.numeric_grade = numeric;
            }
            if let Some(released) = draft.is_released {
                g.is_released = released;
            }
            if draft.remarks.is_some() {
                g.remarks = draft.remarks;
            }
            g.refresh_gpa();
            g.updated_at = Some(store::now_stamp());
            store::update_grade(&tx, &g)?;
            g
        }
        None => {
            let subject = if subject_name.is_none() || draft.units.is_none() {
                store::find_subject(&tx, &key.subject_code)?
            } else {
                None
            };
            let mut g = GradeRecord {
                id: Uuid::new_v4().to_string(),
                student_id: key.student_id,
                subject_code: key.subject_code,
                subject_name: subject_name
                    .or_else(|| subject.as_ref().map(|s| s.name.clone()))
                    .unwrap_or_else(|| UNKNOWN_SUBJECT_NAME.to_string()),
                units: draft.units.or_else(|| subject.as_ref().and_then(|s| s.units)),
                letter_grade: letter,
                numeric_grade: numeric,
                gpa: None,
                academic_year: key.academic_year,
                semester: key.semester,
                is_released: draft.is_released.unwrap_or(false),
                remarks: draft.remarks,
                updated_at: Some(store::now_stamp()),
            };
            g.refresh_gpa();
            store::insert_grade(&tx, &g)?;
            g
        }
    };
    tx.commit()?;

    tracing::info!(
        id = %record.id,
        student_id = %record.student_id,
        subject_code = %record.subject_code,
        letter_grade = ?record.letter_grade.map(|g| g.code()),
        "grade saved"
    );
    Ok(record)
}

/// Flip the visibility flag of one record. Setting it to its current value is a no-op.
pub fn set_grade_released(conn: &Connection, id: &str, released: bool) -> EngineResult<GradeRecord> {
    let Some(mut g) = store::find_grade_by_id(conn, id)? else {
        return Err(EngineError::not_found("grade", id));
    };
    if g.is_released == released {
        return Ok(g);
    }
    g.is_released = released;
    g.updated_at = Some(store::now_stamp());
    store::update_grade(conn, &g)?;
    tracing::info!(id = %g.id, released, "grade visibility changed");
    Ok(g)
}

pub fn release_grade(conn: &Connection, id: &str) -> EngineResult<GradeRecord> {
    set_grade_released(conn, id, true)
}

pub fn unrelease_grade(conn: &Connection, id: &str) -> EngineResult<GradeRecord> {
    set_grade_released(conn, id, false)
}

/// Sets the flag on every roster member's record for the scope; returns how many records matched.
pub fn batch_set_released(
    conn: &Connection,
    scope: &SectionScope,
    released: bool,
) -> EngineResult<usize> {
    let members = roster(conn, &scope.section_id)?;
    let mut affected = 0;
    for student_id in &members {
        affected += store::set_released_by_key(conn, &scope.key_for(student_id), released)?;
    }
    tracing::info!(
        section_id = %scope.section_id,
        subject_code = %scope.subject_code,
        released,
        affected,
        "batch visibility change"
    );
    Ok(affected)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEncodeOutcome {
    pub saved_count: usize,
    pub skipped: Vec<RowRejection>,
}

/// Writes one row of a batch encode. Returns a rejection for rows that are skipped.
fn encode_row(
    conn: &Connection,
    scope: &SectionScope,
    subject_name: &str,
    catalog_units: Option<i64>,
    index: usize,
    row: &serde_json::Value,
) -> Result<(), RowRejection> {
    let Some(obj) = row.as_object() else {
        return Err(RowRejection::bad_params(
            index,
            format!("row at index {} must be an object", index),
        ));
    };
    let student_id = match non_blank(obj.get("studentId").and_then(|v| v.as_str())) {
        Some(v) => v,
        None => {
            return Err(RowRejection::bad_params(
                index,
                format!("row at index {} missing studentId", index),
            ))
        }
    };
    let Some(numeric) = obj.get("numericGrade").and_then(lenient_f64) else {
        return Err(RowRejection::bad_params(
            index,
            format!("row at index {} has an unparseable numericGrade", index),
        ));
    };
    check_numeric_grade(numeric).map_err(|e| RowRejection::from_error(index, &e))?;
    // Absent keeps the stored remarks, null clears them.
    let remarks = match obj.get("remarks") {
        None => None,
        Some(serde_json::Value::Null) => Some(None),
        Some(serde_json::Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            return Err(RowRejection::bad_params(
                index,
                format!("row at index {} has non-text remarks", index),
            ))
        }
    };

    let write = || -> EngineResult<()> {
        let tx = store::write_tx(conn)?;
        let key = scope.key_for(&student_id);
        let existing = store::find_grade_by_key(&tx, &key)?;
        let is_new = existing.is_none();
        let mut g = existing.unwrap_or_else(|| GradeRecord {
            id: Uuid::new_v4().to_string(),
            student_id: key.student_id.clone(),
            subject_code: key.subject_code.clone(),
            subject_name: subject_name.to_string(),
            units: catalog_units,
            letter_grade: None,
            numeric_grade: None,
            gpa: None,
            academic_year: key.academic_year.clone(),
            semester: key.semester.clone(),
            is_released: false,
            remarks: None,
            updated_at: None,
        });
        if let Some(v) = obj.get("units") {
            g.units = lenient_units(v);
        }
        if let Some(r) = &remarks {
            g.remarks = r.clone();
        }
        g.set_numeric(numeric);
        g.updated_at = Some(store::now_stamp());
        if is_new {
            store::insert_grade(&tx, &g)?;
        } else {
            store::update_grade(&tx, &g)?;
        }
        tx.commit()?;
        Ok(())
    };
    write().map_err(|e| RowRejection::from_error(index, &e))
}

/// Encodes numeric grades for a section. Bad rows are skipped, never fatal.
pub fn batch_encode(
    conn: &Connection,
    scope: &SectionScope,
    rows: &[serde_json::Value],
) -> EngineResult<BatchEncodeOutcome> {
    // One catalog lookup per call.
    let (subject_name, catalog_units) = match store::find_subject(conn, &scope.subject_code) {
        Ok(Some(s)) => (s.name, s.units),
        Ok(None) => (UNKNOWN_SUBJECT_NAME.to_string(), None),
        Err(e) => {
            tracing::warn!(subject_code = %scope.subject_code, error = %e, "subject lookup failed");
            (UNKNOWN_SUBJECT_NAME.to_string(), None)
        }
    };

    let mut saved_count = 0;
    let mut skipped = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match encode_row(conn, scope, &subject_name, catalog_units, index, row) {
            Ok(()) => saved_count += 1,
            Err(r) => skipped.push(r),
        }
    }

    tracing::info!(
        section_id = %scope.section_id,
        subject_code = %scope.subject_code,
        saved_count,
        skipped = skipped.len(),
        "batch encode finished"
    );
    Ok(BatchEncodeOutcome {
        saved_count,
        skipped,
    })
}

pub fn term_gpa(
    conn: &Connection,
    student_id: &str,
    academic_year: &str,
    semester: &str,
) -> EngineResult<Option<f64>> {
    let student_id = require_field("studentId", student_id)?;
    let academic_year = require_field("academicYear", academic_year)?;
    let semester = require_field("semester", semester)?;
    let records =
        store::grades_for_student_term(conn, &student_id, &academic_year, &semester, false)?;
    Ok(grades::weighted_gpa(&records))
}

pub fn cumulative_gpa(conn: &Connection, student_id: &str) -> EngineResult<Option<f64>> {
    let student_id = require_field("studentId", student_id)?;
    let records = store::grades_for_student(conn, &student_id)?;
    Ok(grades::weighted_gpa(&records))
}

pub fn statistics(conn: &Connection, scope: &SectionScope) -> EngineResult<GradeStatistics> {
    let members = roster(conn, &scope.section_id)?;
    let records = store::grades_for_students_subject_term(
        conn,
        &members,
        &scope.subject_code,
        &scope.academic_year,
        &scope.semester,
    )?;
    Ok(grades::grade_statistics(members.len(), &records))
}

/// Grades of one student in one term; the student-facing view passes `released_only`.
pub fn grades_for_student_term(
    conn: &Connection,
    student_id: &str,
    academic_year: &str,
    semester: &str,
    released_only: bool,
) -> EngineResult<Vec<GradeRecord>> {
    let student_id = require_field("studentId", student_id)?;
    let academic_year = require_field("academicYear", academic_year)?;
    let semester = require_field("semester", semester)?;
    store::grades_for_student_term(conn, &student_id, &academic_year, &semester, released_only)
}

pub fn grades_for_section(conn: &Connection, scope: &SectionScope) -> EngineResult<Vec<GradeRecord>> {
    let members = roster(conn, &scope.section_id)?;
    store::grades_for_students_subject_term(
        conn,
        &members,
        &scope.subject_code,
        &scope.academic_year,
        &scope.semester,
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermRef {
    pub academic_year: String,
    pub semester: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectsAndTerms {
    pub subjects: Vec<SubjectRef>,
    pub terms: Vec<TermRef>,
}

/// Distinct subjects and terms that appear in the section roster's grade records.
pub fn section_subjects_terms(conn: &Connection, section_id: &str) -> EngineResult<SubjectsAndTerms> {
    let section_id = require_field("sectionId", section_id)?;
    let members = roster(conn, &section_id)?;
    let records = store::grades_for_students(conn, &members)?;

    let mut seen_subjects = HashSet::new();
    let mut seen_terms = HashSet::new();
    let mut out = SubjectsAndTerms {
        subjects: Vec::new(),
        terms: Vec::new(),
    };
    for r in records {
        if seen_subjects.insert(r.subject_code.to_ascii_uppercase()) {
            out.subjects.push(SubjectRef {
                code: r.subject_code.clone(),
                name: r.subject_name.clone(),
            });
        }
        let term_key = (
            r.academic_year.to_ascii_uppercase(),
            r.semester.to_ascii_uppercase(),
        );
        if seen_terms.insert(term_key) {
            out.terms.push(TermRef {
                academic_year: r.academic_year,
                semester: r.semester,
            });
        }
    }
    out.subjects.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::grades::LetterGrade;
    use crate::store::Subject;
    use serde_json::json;

    const YEAR: &str = "2025-2026";
    const SEM: &str = "First";

    fn draft(student: &str, subject: &str) -> GradeDraft {
        GradeDraft {
            student_id: student.into(),
            subject_code: subject.into(),
            academic_year: YEAR.into(),
            semester: SEM.into(),
            ..Default::default()
        }
    }

    fn seed_section(conn: &Connection) {
        store::upsert_subject(
            conn,
            &Subject {
                code: "IT101".into(),
                name: "Introduction to Computing".into(),
                units: Some(3),
            },
        )
        .expect("subject");
        store::upsert_section(
            conn,
            "BSIT-1A",
            "BSIT 1-A",
            &["S1".to_string(), "S2".to_string(), "S3".to_string()],
        )
        .expect("section");
    }

    fn scope() -> SectionScope {
        SectionScope::new("BSIT-1A", "IT101", YEAR, SEM).expect("scope")
    }

    #[test]
    fn save_derives_numeric_from_letter() {
        let conn = db::open_in_memory().expect("open");
        let mut d = draft("S1", "IT101");
        d.letter_grade = Some("b+".into());
        d.units = Some(3);
        let g = save_grade(&conn, d).expect("save");
        assert_eq!(g.letter_grade, Some(LetterGrade::BPlus));
        assert_eq!(g.numeric_grade, Some(1.5));
        assert_eq!(g.gpa, Some(4.5));
        assert!(!g.is_released);
        assert_eq!(g.subject_name, UNKNOWN_SUBJECT_NAME);
    }

    #[test]
    fn save_derives_letter_from_numeric_and_stamps_catalog_name() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        let mut d = draft("S1", "IT101");
        d.numeric_grade = Some(2.6);
        let g = save_grade(&conn, d).expect("save");
        assert_eq!(g.letter_grade, Some(LetterGrade::C));
        assert_eq!(g.subject_name, "Introduction to Computing");
        assert_eq!(g.units, Some(3));
        let gpa = g.gpa.expect("gpa");
        assert!((gpa - 7.8).abs() < 1e-9);
    }

    #[test]
    fn save_upserts_by_key_and_keeps_release_flag() {
        let conn = db::open_in_memory().expect("open");
        let mut d = draft("S1", "IT101");
        d.numeric_grade = Some(1.0);
        d.units = Some(3);
        let first = save_grade(&conn, d).expect("first");
        release_grade(&conn, &first.id).expect("release");

        let mut d = draft("s1", "it101");
        d.letter_grade = Some("INC".into());
        let second = save_grade(&conn, d).expect("second");
        assert_eq!(second.id, first.id);
        assert!(second.is_released);
        assert_eq!(second.numeric_grade, None);
        assert_eq!(second.gpa, None);
        assert_eq!(second.units, Some(3));
    }

    #[test]
    fn save_rejects_blank_identity_and_bad_grades() {
        let conn = db::open_in_memory().expect("open");
        let e = save_grade(&conn, draft(" ", "IT101")).expect_err("blank student");
        assert_eq!(e.code(), "bad_params");

        let mut d = draft("S1", "IT101");
        d.letter_grade = Some("Q".into());
        assert_eq!(save_grade(&conn, d).expect_err("letter").code(), "bad_params");

        let mut d = draft("S1", "IT101");
        d.numeric_grade = Some(6.0);
        assert_eq!(save_grade(&conn, d).expect_err("numeric").code(), "bad_params");

        let mut d = draft("S1", "IT101");
        d.units = Some(0);
        assert_eq!(save_grade(&conn, d).expect_err("units").code(), "bad_params");
    }

    #[test]
    fn release_is_idempotent_and_unknown_is_not_found() {
        let conn = db::open_in_memory().expect("open");
        let e = release_grade(&conn, "missing").expect_err("unknown");
        assert_eq!(e.code(), "not_found");

        let mut d = draft("S1", "IT101");
        d.numeric_grade = Some(1.25);
        let g = save_grade(&conn, d).expect("save");
        assert!(release_grade(&conn, &g.id).expect("first").is_released);
        assert!(release_grade(&conn, &g.id).expect("second").is_released);
        assert!(!unrelease_grade(&conn, &g.id).expect("undo").is_released);
    }

    #[test]
    fn batch_encode_skips_unparseable_rows() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        let rows = vec![
            json!({ "studentId": "S1", "numericGrade": 1.5, "units": 3 }),
            json!({ "studentId": "S2", "numericGrade": "1.0", "units": "3", "remarks": "good" }),
            json!({ "studentId": "S3", "numericGrade": "abc" }),
            json!({ "numericGrade": 2.0 }),
            json!({ "studentId": "S3", "numericGrade": 9.0 }),
        ];
        let out = batch_encode(&conn, &scope(), &rows).expect("batch");
        assert_eq!(out.saved_count, 2);
        assert_eq!(out.skipped.len(), 3);
        assert_eq!(out.skipped[0].index, 2);

        let gpa = term_gpa(&conn, "S1", YEAR, SEM).expect("gpa").expect("value");
        assert!((gpa - 1.5).abs() < 1e-9);

        let s2 = store::find_grade_by_key(&conn, &scope().key_for("S2"))
            .expect("query")
            .expect("row");
        assert_eq!(s2.letter_grade, Some(LetterGrade::A));
        assert_eq!(s2.subject_name, "Introduction to Computing");
        assert_eq!(s2.remarks.as_deref(), Some("good"));
    }

    #[test]
    fn batch_encode_skips_rows_with_non_text_remarks() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        batch_encode(
            &conn,
            &scope(),
            &[json!({ "studentId": "S1", "numericGrade": 1.5, "remarks": "kept" })],
        )
        .expect("seed");

        let out = batch_encode(
            &conn,
            &scope(),
            &[
                json!({ "studentId": "S1", "numericGrade": 1.0, "remarks": 42 }),
                json!({ "studentId": "S2", "numericGrade": 2.0, "remarks": true }),
            ],
        )
        .expect("batch");
        assert_eq!(out.saved_count, 0);
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.iter().all(|r| r.code == "bad_params"));

        let g = store::find_grade_by_key(&conn, &scope().key_for("S1"))
            .expect("query")
            .expect("row");
        assert_eq!(g.remarks.as_deref(), Some("kept"));
        assert_eq!(g.numeric_grade, Some(1.5));

        let out = batch_encode(
            &conn,
            &scope(),
            &[json!({ "studentId": "S1", "numericGrade": 1.5, "remarks": null })],
        )
        .expect("clear");
        assert_eq!(out.saved_count, 1);
        let g = store::find_grade_by_key(&conn, &scope().key_for("S1"))
            .expect("query")
            .expect("row");
        assert_eq!(g.remarks, None);
    }

    #[test]
    fn huge_units_are_rejected_and_gpa_stays_finite() {
        let conn = db::open_in_memory().expect("open");
        for subject in ["IT101", "IT102"] {
            let mut d = draft("S1", subject);
            d.units = Some(i64::MAX);
            d.numeric_grade = Some(1.0);
            assert_eq!(save_grade(&conn, d).expect_err("units").code(), "bad_params");
        }

        let out = batch_encode(
            &conn,
            &SectionScope::new("ANY", "IT101", YEAR, SEM).expect("scope"),
            &[json!({ "studentId": "S1", "numericGrade": 1.0, "units": 1e30 })],
        )
        .expect("batch");
        assert_eq!(out.saved_count, 1);
        let g = store::find_grade_by_key(&conn, &scope().key_for("S1"))
            .expect("query")
            .expect("row");
        assert_eq!(g.units, None);

        assert_eq!(term_gpa(&conn, "S1", YEAR, SEM).expect("term"), None);
    }

    #[test]
    fn batch_encode_unparseable_units_clears_units() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        let rows = vec![json!({ "studentId": "S1", "numericGrade": 2.0, "units": "n/a" })];
        let out = batch_encode(&conn, &scope(), &rows).expect("batch");
        assert_eq!(out.saved_count, 1);
        let g = store::find_grade_by_key(&conn, &scope().key_for("S1"))
            .expect("query")
            .expect("row");
        assert_eq!(g.units, None);
        assert_eq!(g.gpa, None);
    }

    #[test]
    fn batch_encode_without_catalog_entry_uses_sentinel_name() {
        let conn = db::open_in_memory().expect("open");
        let scope = SectionScope::new("ANY", "XX999", YEAR, SEM).expect("scope");
        let rows = vec![json!({ "studentId": "S1", "numericGrade": 3.0, "units": 2 })];
        batch_encode(&conn, &scope, &rows).expect("batch");
        let g = store::find_grade_by_key(&conn, &scope.key_for("S1"))
            .expect("query")
            .expect("row");
        assert_eq!(g.subject_name, UNKNOWN_SUBJECT_NAME);
    }

    #[test]
    fn batch_release_counts_matched_records() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        let rows = vec![
            json!({ "studentId": "S1", "numericGrade": 1.5 }),
            json!({ "studentId": "S2", "numericGrade": 2.0 }),
            json!({ "studentId": "OUTSIDER", "numericGrade": 2.0 }),
        ];
        batch_encode(&conn, &scope(), &rows).expect("batch");

        assert_eq!(batch_set_released(&conn, &scope(), true).expect("release"), 2);
        let stats = statistics(&conn, &scope()).expect("stats");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.encoded, 2);
        assert_eq!(stats.released, 2);
        assert_eq!(stats.average, Some(1.75));

        assert_eq!(batch_set_released(&conn, &scope(), false).expect("unrelease"), 2);
        assert_eq!(statistics(&conn, &scope()).expect("stats").released, 0);

        let missing = SectionScope::new("NOPE", "IT101", YEAR, SEM).expect("scope");
        assert_eq!(
            batch_set_released(&conn, &missing, true).expect_err("no section").code(),
            "not_found"
        );
    }

    #[test]
    fn gpa_aggregates_term_and_cumulative() {
        let conn = db::open_in_memory().expect("open");
        for (subject, numeric, sem) in [("IT101", 1.5, "First"), ("IT102", 1.0, "First"), ("IT201", 2.0, "Second")] {
            let mut d = draft("S1", subject);
            d.semester = sem.into();
            d.numeric_grade = Some(numeric);
            d.units = Some(3);
            save_grade(&conn, d).expect("save");
        }
        let mut d = draft("S1", "PE1");
        d.letter_grade = Some("NGY".into());
        d.units = Some(2);
        save_grade(&conn, d).expect("ngy");

        let term = term_gpa(&conn, "S1", YEAR, SEM).expect("term").expect("value");
        assert!((term - 1.25).abs() < 1e-9);
        let cumulative = cumulative_gpa(&conn, "S1").expect("cum").expect("value");
        assert!((cumulative - 1.5).abs() < 1e-9);
        assert_eq!(term_gpa(&conn, "S9", YEAR, SEM).expect("empty"), None);
    }

    #[test]
    fn released_view_hides_unreleased_grades() {
        let conn = db::open_in_memory().expect("open");
        let mut a = draft("S1", "IT101");
        a.numeric_grade = Some(1.0);
        let a = save_grade(&conn, a).expect("a");
        let mut b = draft("S1", "IT102");
        b.numeric_grade = Some(2.0);
        save_grade(&conn, b).expect("b");
        release_grade(&conn, &a.id).expect("release");

        let all = grades_for_student_term(&conn, "S1", YEAR, SEM, false).expect("all");
        let visible = grades_for_student_term(&conn, "S1", YEAR, SEM, true).expect("visible");
        assert_eq!(all.len(), 2);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, a.id);
    }

    #[test]
    fn subjects_and_terms_are_distinct() {
        let conn = db::open_in_memory().expect("open");
        seed_section(&conn);
        batch_encode(
            &conn,
            &scope(),
            &[
                json!({ "studentId": "S1", "numericGrade": 1.5 }),
                json!({ "studentId": "S2", "numericGrade": 2.5 }),
            ],
        )
        .expect("batch");
        let mut d = draft("S1", "IT102");
        d.semester = "Second".into();
        d.numeric_grade = Some(1.0);
        save_grade(&conn, d).expect("save");

        let out = section_subjects_terms(&conn, "BSIT-1A").expect("query");
        assert_eq!(out.subjects.len(), 2);
        assert_eq!(out.terms.len(), 2);
    }
}
