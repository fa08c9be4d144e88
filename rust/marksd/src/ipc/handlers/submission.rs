use crate::backend::interpret_submission;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_submission_interpret(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let status = match req.params.get("status").and_then(|v| v.as_u64()) {
        Some(v) if (100..=599).contains(&v) => v as u16,
        _ => return err(&req.id, "bad_params", "missing/invalid status", None),
    };
    let body = req.params.get("body").unwrap_or(&Value::Null);

    let outcome = interpret_submission(status, body);
    match outcome.clone().into_result() {
        Ok(_) => tracing::info!(status, "submission accepted"),
        Err(e) => tracing::info!(status, message = %e, "submission rejected by backend"),
    }
    ok(&req.id, json!({ "outcome": outcome }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submission.interpret" => Some(handle_submission_interpret(state, req)),
        _ => None,
    }
}
