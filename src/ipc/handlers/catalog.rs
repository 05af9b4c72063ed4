//! Minimal subject catalog and section roster upkeep. The grade and schedule
//! handlers only read these tables; full catalog management lives elsewhere.

use crate::grades::{lenient_units, require_field};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Subject};
use serde_json::json;

fn handle_subjects_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let code = match require_field("code", str_param(req, "code")) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let name = match require_field("name", str_param(req, "name")) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let units = req.params.get("units").and_then(lenient_units);

    let subject = Subject { code, name, units };
    if let Err(e) = store::upsert_subject(conn, &subject) {
        return engine_err(&req.id, e);
    }
    ok(&req.id, json!({ "subject": subject }))
}

fn handle_sections_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let section_id = match require_field("sectionId", str_param(req, "sectionId")) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let name = match str_param(req, "name").trim() {
        "" => section_id.clone(),
        n => n.to_string(),
    };
    let Some(ids_arr) = req.params.get("studentIds").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing studentIds[]", None);
    };

    let mut student_ids = Vec::with_capacity(ids_arr.len());
    for (i, v) in ids_arr.iter().enumerate() {
        match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => student_ids.push(s.to_string()),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("studentIds[{}] must be a non-empty string", i),
                    None,
                )
            }
        }
    }

    match store::upsert_section(conn, &section_id, &name, &student_ids) {
        Ok(member_count) => ok(
            &req.id,
            json!({ "sectionId": section_id, "memberCount": member_count }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_sections_members(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = str_param(req, "sectionId");

    match store::section_members(conn, section_id) {
        Ok(Some(ids)) => ok(&req.id, json!({ "studentIds": ids })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "section not found",
            Some(json!({ "sectionId": section_id })),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.upsert" => Some(handle_subjects_upsert(state, req)),
        "sections.upsert" => Some(handle_sections_upsert(state, req)),
        "sections.members" => Some(handle_sections_members(state, req)),
        _ => None,
    }
}
