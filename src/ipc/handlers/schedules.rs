use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{opt_str_param, parse_params, str_param};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, ScheduleDraft};
use serde_json::json;

const BULK_CREATE_MAX_ENTRIES: usize = 2000;

fn handle_schedules_check_conflict(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let draft: ScheduleDraft = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let exclude_id = opt_str_param(req, "excludeId");
    let candidate = match draft.into_entry(exclude_id.unwrap_or_default().to_string()) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    match schedule::check_schedule_conflict(conn, &candidate, exclude_id) {
        Ok(()) => ok(&req.id, json!({ "conflict": false })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let draft: ScheduleDraft = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    match schedule::create_schedule(conn, draft) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = opt_str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let draft: ScheduleDraft = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    match schedule::update_schedule(conn, id, draft) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_bulk_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(entries_arr) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing entries[]", None);
    };
    if entries_arr.len() > BULK_CREATE_MAX_ENTRIES {
        return err(
            &req.id,
            "bad_params",
            format!(
                "bulk payload exceeds max entries: {} > {}",
                entries_arr.len(),
                BULK_CREATE_MAX_ENTRIES
            ),
            None,
        );
    }

    let drafts: Vec<Result<ScheduleDraft, String>> = entries_arr
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if !v.is_object() {
                return Err(format!("entry at index {} must be an object", i));
            }
            serde_json::from_value::<ScheduleDraft>(v.clone())
                .map_err(|e| format!("entry at index {} is invalid: {}", i, e))
        })
        .collect();

    match schedule::bulk_create_schedules(conn, drafts) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "createdCount": outcome.created.len(),
                "rejectedCount": outcome.rejected.len(),
                "created": outcome.created,
                "rejected": outcome.rejected,
            }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = opt_str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    match schedule::delete_schedule(conn, id) {
        Ok(()) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schedule::schedules_for_student(
        conn,
        str_param(req, "studentId"),
        opt_str_param(req, "academicYear"),
        opt_str_param(req, "semester"),
    ) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_schedules_list_for_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schedule::schedules_for_section(conn, str_param(req, "sectionId")) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.checkConflict" => Some(handle_schedules_check_conflict(state, req)),
        "schedules.create" => Some(handle_schedules_create(state, req)),
        "schedules.update" => Some(handle_schedules_update(state, req)),
        "schedules.bulkCreate" => Some(handle_schedules_bulk_create(state, req)),
        "schedules.delete" => Some(handle_schedules_delete(state, req)),
        "schedules.list" => Some(handle_schedules_list(state, req)),
        "schedules.listForSection" => Some(handle_schedules_list_for_section(state, req)),
        _ => None,
    }
}
