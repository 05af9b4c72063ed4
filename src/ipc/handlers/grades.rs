use crate::gradebook::{self, SectionScope};
use crate::grades::{validate_grade_input, GradeDraft};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{parse_params, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const BATCH_ENCODE_MAX_ROWS: usize = 2000;

fn scope_from(req: &Request) -> Result<SectionScope, serde_json::Value> {
    SectionScope::new(
        str_param(req, "sectionId"),
        str_param(req, "subjectCode"),
        str_param(req, "academicYear"),
        str_param(req, "semester"),
    )
    .map_err(|e| engine_err(&req.id, e))
}

fn handle_grades_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let draft: GradeDraft = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    match gradebook::save_grade(conn, draft) {
        Ok(g) => ok(&req.id, json!({ "grade": g })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_set_released(state: &mut AppState, req: &Request, released: bool) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(grade_id) = req.params.get("gradeId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing gradeId", None);
    };
    let result = if released {
        gradebook::release_grade(conn, grade_id)
    } else {
        gradebook::unrelease_grade(conn, grade_id)
    };
    match result {
        Ok(g) => ok(&req.id, json!({ "grade": g })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_batch_encode(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match scope_from(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(rows) = req.params.get("grades").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing grades[]", None);
    };
    if rows.len() > BATCH_ENCODE_MAX_ROWS {
        return err(
            &req.id,
            "bad_params",
            format!(
                "batch payload exceeds max rows: {} > {}",
                rows.len(),
                BATCH_ENCODE_MAX_ROWS
            ),
            Some(json!({ "maxRows": BATCH_ENCODE_MAX_ROWS })),
        );
    }

    match gradebook::batch_encode(conn, &scope, rows) {
        Ok(outcome) => {
            let mut result = json!({ "savedCount": outcome.saved_count });
            if !outcome.skipped.is_empty() {
                result["skippedCount"] = json!(outcome.skipped.len());
                result["skipped"] = json!(outcome.skipped);
            }
            ok(&req.id, result)
        }
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_batch_set_released(
    state: &mut AppState,
    req: &Request,
    released: bool,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match scope_from(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match gradebook::batch_set_released(conn, &scope, released) {
        Ok(affected) => ok(&req.id, json!({ "affected": affected })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_term_gpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gradebook::term_gpa(
        conn,
        str_param(req, "studentId"),
        str_param(req, "academicYear"),
        str_param(req, "semester"),
    ) {
        Ok(gpa) => ok(&req.id, json!({ "gpa": gpa })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_cumulative_gpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gradebook::cumulative_gpa(conn, str_param(req, "studentId")) {
        Ok(gpa) => ok(&req.id, json!({ "gpa": gpa })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match scope_from(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match gradebook::statistics(conn, &scope) {
        Ok(stats) => ok(&req.id, json!(stats)),
        Err(e) => engine_err(&req.id, e),
    }
}

// No workspace needed: pure conversion.
fn handle_grades_validate(req: &Request) -> serde_json::Value {
    let raw = match req.params.get("grade") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    ok(&req.id, json!(validate_grade_input(&raw)))
}

fn handle_grades_list_for_student(
    state: &mut AppState,
    req: &Request,
    released_only: bool,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gradebook::grades_for_student_term(
        conn,
        str_param(req, "studentId"),
        str_param(req, "academicYear"),
        str_param(req, "semester"),
        released_only,
    ) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_list_for_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match scope_from(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match gradebook::grades_for_section(conn, &scope) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_section_subjects_terms(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gradebook::section_subjects_terms(conn, str_param(req, "sectionId")) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.save" => Some(handle_grades_save(state, req)),
        "grades.release" => Some(handle_grades_set_released(state, req, true)),
        "grades.unrelease" => Some(handle_grades_set_released(state, req, false)),
        "grades.batchEncode" => Some(handle_grades_batch_encode(state, req)),
        "grades.batchRelease" => Some(handle_grades_batch_set_released(state, req, true)),
        "grades.batchUnrelease" => Some(handle_grades_batch_set_released(state, req, false)),
        "grades.termGpa" => Some(handle_grades_term_gpa(state, req)),
        "grades.cumulativeGpa" => Some(handle_grades_cumulative_gpa(state, req)),
        "grades.statistics" => Some(handle_grades_statistics(state, req)),
        "grades.validate" => Some(handle_grades_validate(req)),
        "grades.listForStudent" => Some(handle_grades_list_for_student(state, req, false)),
        "grades.listReleased" => Some(handle_grades_list_for_student(state, req, true)),
        "grades.listForSection" => Some(handle_grades_list_for_section(state, req)),
        "grades.sectionSubjectsTerms" => Some(handle_grades_section_subjects_terms(state, req)),
        _ => None,
    }
}
