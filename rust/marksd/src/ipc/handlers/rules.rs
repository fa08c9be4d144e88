use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::rules::{normalize_terminal, resolve_subject_rule};
use serde_json::json;

fn handle_rules_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    // A missing or null name resolves to the regular rule.
    let subject_name = match req.params.get("subjectName") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s),
            None => return err(&req.id, "bad_params", "subjectName must be a string", None),
        },
    };
    let rule = resolve_subject_rule(subject_name, &state.config.rules);
    ok(&req.id, json!({ "rule": rule }))
}

fn handle_terminal_normalize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("terminal").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing terminal", None);
    };
    ok(
        &req.id,
        json!({ "terminal": normalize_terminal(raw, &state.config.terminals) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rules.resolve" => Some(handle_rules_resolve(state, req)),
        "terminal.normalize" => Some(handle_terminal_normalize(state, req)),
        _ => None,
    }
}
