use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConflictKind, EngineError, EngineResult, RowRejection};
use crate::grades::{check_units, require_field};
use crate::store;

pub const STUDENT_CONFLICT_REASON: &str =
    "student already has a class in this room at this day/time";
pub const FACULTY_CONFLICT_REASON: &str =
    "faculty is already assigned to another class at this day/time";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub student_id: String,
    pub section_id: Option<String>,
    pub subject_code: String,
    pub description: Option<String>,
    pub units: Option<i64>,
    pub day_time: String,
    pub room: String,
    pub faculty_id: Option<String>,
    pub academic_year: String,
    pub semester: String,
    pub created_at: Option<String>,
}

impl ScheduleEntry {
    fn same_term(&self, other: &ScheduleEntry) -> bool {
        self.academic_year.eq_ignore_ascii_case(&other.academic_year)
            && self.semester.eq_ignore_ascii_case(&other.semester)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleDraft {
    pub student_id: String,
    pub section_id: Option<String>,
    pub subject_code: String,
    pub description: Option<String>,
    pub units: Option<i64>,
    pub day_time: String,
    pub room: String,
    pub faculty_id: Option<String>,
    pub academic_year: String,
    pub semester: String,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ScheduleDraft {
    pub fn into_entry(self, id: String) -> EngineResult<ScheduleEntry> {
        if let Some(u) = self.units {
            check_units(u)?;
        }
        Ok(ScheduleEntry {
            id,
            student_id: require_field("studentId", &self.student_id)?,
            section_id: non_blank(self.section_id),
            subject_code: require_field("subjectCode", &self.subject_code)?,
            description: non_blank(self.description),
            units: self.units,
            day_time: require_field("dayTime", &self.day_time)?,
            room: require_field("room", &self.room)?,
            faculty_id: non_blank(self.faculty_id),
            academic_year: require_field("academicYear", &self.academic_year)?,
            semester: require_field("semester", &self.semester)?,
            created_at: None,
        })
    }
}

fn excluded(entry: &ScheduleEntry, exclude_id: Option<&str>) -> bool {
    exclude_id.map(|id| entry.id == id).unwrap_or(false)
}

/// Same student and term, same day/time token and same room.
pub fn student_conflict<'a, I>(
    candidate: &ScheduleEntry,
    existing: I,
    exclude_id: Option<&str>,
) -> Option<&'a ScheduleEntry>
where
    I: IntoIterator<Item = &'a ScheduleEntry>,
{
    existing.into_iter().find(|e| {
        !excluded(e, exclude_id)
            && e.student_id.eq_ignore_ascii_case(&candidate.student_id)
            && e.same_term(candidate)
            && e.day_time.eq_ignore_ascii_case(&candidate.day_time)
            && e.room.eq_ignore_ascii_case(&candidate.room)
    })
}

/// Same faculty and term, same day/time token. Room does not matter.
pub fn faculty_conflict<'a, I>(
    candidate: &ScheduleEntry,
    existing: I,
    exclude_id: Option<&str>,
) -> Option<&'a ScheduleEntry>
where
    I: IntoIterator<Item = &'a ScheduleEntry>,
{
    let faculty = candidate.faculty_id.as_deref()?;
    existing.into_iter().find(|e| {
        !excluded(e, exclude_id)
            && e.faculty_id
                .as_deref()
                .map(|f| f.eq_ignore_ascii_case(faculty))
                .unwrap_or(false)
            && e.same_term(candidate)
            && e.day_time.eq_ignore_ascii_case(&candidate.day_time)
    })
}

/// Runs both double-booking checks against stored entries of the candidate's term.
pub fn check_schedule_conflict(
    conn: &Connection,
    candidate: &ScheduleEntry,
    exclude_id: Option<&str>,
) -> EngineResult<()> {
    let student_entries = store::schedules_for_student_term(
        conn,
        &candidate.student_id,
        &candidate.academic_year,
        &candidate.semester,
    )?;
    if let Some(hit) = student_conflict(candidate, &student_entries, exclude_id) {
        tracing::warn!(
            student_id = %candidate.student_id,
            day_time = %candidate.day_time,
            room = %candidate.room,
            existing_id = %hit.id,
            "student double-booked"
        );
        return Err(EngineError::Conflict {
            kind: ConflictKind::Student,
            reason: STUDENT_CONFLICT_REASON.to_string(),
            existing_id: hit.id.clone(),
        });
    }

    if let Some(faculty_id) = candidate.faculty_id.as_deref() {
        let faculty_entries = store::schedules_for_faculty_term(
            conn,
            faculty_id,
            &candidate.academic_year,
            &candidate.semester,
        )?;
        if let Some(hit) = faculty_conflict(candidate, &faculty_entries, exclude_id) {
            tracing::warn!(
                faculty_id = %faculty_id,
                day_time = %candidate.day_time,
                existing_id = %hit.id,
                "faculty double-booked"
            );
            return Err(EngineError::Conflict {
                kind: ConflictKind::Faculty,
                reason: FACULTY_CONFLICT_REASON.to_string(),
                existing_id: hit.id.clone(),
            });
        }
    }

    Ok(())
}

pub fn create_schedule(conn: &Connection, draft: ScheduleDraft) -> EngineResult<ScheduleEntry> {
    let mut entry = draft.into_entry(Uuid::new_v4().to_string())?;
    entry.created_at = Some(store::now_stamp());

    let tx = store::write_tx(conn)?;
    check_schedule_conflict(&tx, &entry, None)?;
    store::insert_schedule(&tx, &entry)?;
    tx.commit()?;

    tracing::info!(
        id = %entry.id,
        student_id = %entry.student_id,
        subject_code = %entry.subject_code,
        "schedule entry created"
    );
    Ok(entry)
}

pub fn update_schedule(
    conn: &Connection,
    id: &str,
    draft: ScheduleDraft,
) -> EngineResult<ScheduleEntry> {
    let tx = store::write_tx(conn)?;
    let Some(existing) = store::find_schedule_by_id(&tx, id)? else {
        return Err(EngineError::not_found("schedule entry", id));
    };
    let mut entry = draft.into_entry(existing.id.clone())?;
    entry.created_at = existing.created_at;

    check_schedule_conflict(&tx, &entry, Some(id))?;
    store::update_schedule(&tx, &entry)?;
    tx.commit()?;

    tracing::info!(id = %entry.id, "schedule entry updated");
    Ok(entry)
}

pub fn delete_schedule(conn: &Connection, id: &str) -> EngineResult<()> {
    if store::delete_schedule(conn, id)? == 0 {
        return Err(EngineError::not_found("schedule entry", id));
    }
    tracing::info!(id = %id, "schedule entry deleted");
    Ok(())
}

/// The student's entries for one term when both term fields are given, otherwise all of them.
pub fn schedules_for_student(
    conn: &Connection,
    student_id: &str,
    academic_year: Option<&str>,
    semester: Option<&str>,
) -> EngineResult<Vec<ScheduleEntry>> {
    let student_id = require_field("studentId", student_id)?;
    let academic_year = non_blank(academic_year.map(String::from));
    let semester = non_blank(semester.map(String::from));
    match (academic_year, semester) {
        (Some(y), Some(s)) => store::schedules_for_student_term(conn, &student_id, &y, &s),
        _ => store::schedules_for_students(conn, &[student_id]),
    }
}

/// Entries of every student on the section roster.
pub fn schedules_for_section(conn: &Connection, section_id: &str) -> EngineResult<Vec<ScheduleEntry>> {
    let section_id = require_field("sectionId", section_id)?;
    let Some(members) = store::section_members(conn, &section_id)? else {
        return Err(EngineError::not_found("section", &section_id));
    };
    store::schedules_for_students(conn, &members)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScheduleOutcome {
    pub created: Vec<ScheduleEntry>,
    pub rejected: Vec<RowRejection>,
}

/// Creates each entry independently. Later entries are checked against the
/// ones created earlier in the same call.
pub fn bulk_create_schedules(
    conn: &Connection,
    drafts: Vec<Result<ScheduleDraft, String>>,
) -> EngineResult<BulkScheduleOutcome> {
    let mut created = Vec::new();
    let mut rejected = Vec::new();

    for (index, draft) in drafts.into_iter().enumerate() {
        let draft = match draft {
            Ok(d) => d,
            Err(message) => {
                rejected.push(RowRejection::bad_params(index, message));
                continue;
            }
        };
        match create_schedule(conn, draft) {
            Ok(entry) => created.push(entry),
            Err(EngineError::Storage(e)) => return Err(EngineError::Storage(e)),
            Err(e) => rejected.push(RowRejection::from_error(index, &e)),
        }
    }

    tracing::info!(
        created = created.len(),
        rejected = rejected.len(),
        "bulk schedule create finished"
    );
    Ok(BulkScheduleOutcome { created, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn draft(student: &str, day_time: &str, room: &str, faculty: Option<&str>) -> ScheduleDraft {
        ScheduleDraft {
            student_id: student.into(),
            subject_code: "IT101".into(),
            day_time: day_time.into(),
            room: room.into(),
            faculty_id: faculty.map(String::from),
            academic_year: "2025-2026".into(),
            semester: "First".into(),
            ..Default::default()
        }
    }

    #[test]
    fn student_room_and_time_clash_is_rejected() {
        let conn = db::open_in_memory().expect("open");
        create_schedule(&conn, draft("S1", "MWF 9-10", "101", None)).expect("first");

        let e = create_schedule(&conn, draft("S1", "mwf 9-10", "101", None))
            .expect_err("same slot");
        match e {
            EngineError::Conflict { kind, .. } => assert_eq!(kind, ConflictKind::Student),
            other => panic!("unexpected: {other:?}"),
        }

        create_schedule(&conn, draft("S1", "MWF 9-10", "102", None)).expect("different room");
    }

    #[test]
    fn other_terms_are_ignored() {
        let conn = db::open_in_memory().expect("open");
        create_schedule(&conn, draft("S1", "MWF 9-10", "101", Some("F1"))).expect("first");
        let mut second = draft("S1", "MWF 9-10", "101", Some("F1"));
        second.semester = "Second".into();
        create_schedule(&conn, second).expect("next term");
    }

    #[test]
    fn faculty_double_booking_ignores_room() {
        let conn = db::open_in_memory().expect("open");
        create_schedule(&conn, draft("S1", "TTh 1-2:30", "201", Some("F1"))).expect("first");

        let e = create_schedule(&conn, draft("S2", "TTh 1-2:30", "305", Some("f1")))
            .expect_err("faculty busy");
        match e {
            EngineError::Conflict { kind, reason, .. } => {
                assert_eq!(kind, ConflictKind::Faculty);
                assert_eq!(reason, FACULTY_CONFLICT_REASON);
            }
            other => panic!("unexpected: {other:?}"),
        }

        create_schedule(&conn, draft("S2", "TTh 1-2:30", "305", Some("F2"))).expect("other faculty");
        create_schedule(&conn, draft("S3", "TTh 1-2:30", "306", Some("  "))).expect("blank faculty");
    }

    #[test]
    fn overlapping_but_different_tokens_are_not_caught() {
        let conn = db::open_in_memory().expect("open");
        create_schedule(&conn, draft("S1", "MWF 9-10", "101", None)).expect("first");
        create_schedule(&conn, draft("S1", "MWF 9:30-10:30", "101", None)).expect("textually different");
    }

    #[test]
    fn update_does_not_conflict_with_itself() {
        let conn = db::open_in_memory().expect("open");
        let e = create_schedule(&conn, draft("S1", "MWF 9-10", "101", Some("F1"))).expect("create");
        let updated = update_schedule(&conn, &e.id, draft("S1", "MWF 9-10", "101", Some("F1")))
            .expect("self update");
        assert_eq!(updated.id, e.id);
        assert_eq!(updated.created_at, e.created_at);
    }

    #[test]
    fn update_into_another_slot_conflicts() {
        let conn = db::open_in_memory().expect("open");
        create_schedule(&conn, draft("S1", "MWF 9-10", "101", None)).expect("a");
        let b = create_schedule(&conn, draft("S1", "MWF 10-11", "101", None)).expect("b");
        let e = update_schedule(&conn, &b.id, draft("S1", "MWF 9-10", "101", None))
            .expect_err("moves onto a");
        assert_eq!(e.code(), "conflict");
    }

    #[test]
    fn update_and_delete_unknown_id_are_not_found() {
        let conn = db::open_in_memory().expect("open");
        let e = update_schedule(&conn, "nope", draft("S1", "MWF 9-10", "101", None))
            .expect_err("missing");
        assert_eq!(e.code(), "not_found");
        assert_eq!(delete_schedule(&conn, "nope").expect_err("missing").code(), "not_found");
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        let conn = db::open_in_memory().expect("open");
        let e = create_schedule(&conn, draft("S1", " ", "101", None)).expect_err("no dayTime");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn units_outside_the_allowed_range_are_rejected() {
        let conn = db::open_in_memory().expect("open");
        for units in [0, crate::grades::MAX_UNITS + 1, i64::MAX] {
            let mut d = draft("S1", "MWF 9-10", "101", None);
            d.units = Some(units);
            assert_eq!(create_schedule(&conn, d).expect_err("units").code(), "bad_params");
        }
        let mut d = draft("S1", "MWF 9-10", "101", None);
        d.units = Some(3);
        assert_eq!(create_schedule(&conn, d).expect("three units").units, Some(3));
    }

    #[test]
    fn bulk_create_checks_against_earlier_rows() {
        let conn = db::open_in_memory().expect("open");
        let out = bulk_create_schedules(
            &conn,
            vec![
                Ok(draft("S1", "MWF 9-10", "101", Some("F1"))),
                Ok(draft("S2", "MWF 9-10", "102", Some("F1"))),
                Err("entry at index 2 must be an object".into()),
                Ok(draft("S2", "MWF 9-10", "102", Some("F2"))),
            ],
        )
        .expect("bulk");
        assert_eq!(out.created.len(), 2);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].index, 1);
        assert_eq!(out.rejected[0].code, "conflict");
        assert_eq!(out.rejected[1].index, 2);
    }

    #[test]
    fn listing_by_term_and_by_section() {
        let conn = db::open_in_memory().expect("open");
        store::upsert_section(&conn, "SEC-A", "Section A", &["S1".to_string()]).expect("section");
        create_schedule(&conn, draft("S1", "MWF 9-10", "101", None)).expect("a");
        let mut later = draft("S1", "MWF 9-10", "101", None);
        later.academic_year = "2026-2027".into();
        create_schedule(&conn, later).expect("b");
        create_schedule(&conn, draft("S2", "MWF 9-10", "101", None)).expect("c");

        let term = schedules_for_student(&conn, "s1", Some("2025-2026"), Some("first")).expect("term");
        assert_eq!(term.len(), 1);
        let all = schedules_for_student(&conn, "S1", None, Some("First")).expect("all");
        assert_eq!(all.len(), 2);
        assert_eq!(schedules_for_section(&conn, "SEC-A").expect("section").len(), 2);
        assert_eq!(schedules_for_section(&conn, "SEC-Z").expect_err("missing").code(), "not_found");
    }

    #[test]
    fn pure_checks_respect_exclusion() {
        let existing = draft("S1", "MWF 9-10", "101", Some("F1"))
            .into_entry("e1".into())
            .expect("entry");
        let candidate = draft("S1", "MWF 9-10", "101", Some("F1"))
            .into_entry("e1".into())
            .expect("entry");
        let all = vec![existing];
        assert!(student_conflict(&candidate, &all, None).is_some());
        assert!(student_conflict(&candidate, &all, Some("e1")).is_none());
        assert!(faculty_conflict(&candidate, &all, Some("e1")).is_none());
    }
}
