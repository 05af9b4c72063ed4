use serde::de::DeserializeOwned;

use crate::error::EngineError;
use crate::ipc::types::Request;

/// String param, or "" when absent. Blank checks happen in the engine so the
/// error names the field consistently.
pub fn str_param<'a>(req: &'a Request, name: &str) -> &'a str {
    req.params.get(name).and_then(|v| v.as_str()).unwrap_or("")
}

pub fn opt_str_param<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.params.get(name).and_then(|v| v.as_str())
}

/// Deserialize the whole params object into a typed draft.
pub fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, EngineError> {
    let params = if req.params.is_null() {
        serde_json::json!({})
    } else {
        req.params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| EngineError::validation(format!("invalid params: {}", e)))
}
