use crate::backend::parse_subjects;
use crate::error::MarksError;
use crate::ipc::error::{err, marks_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::marks::{
    build_payload, reduce, summarize, validate_entries, FieldOutcome, FormAction, HeaderPatch,
    MarkField, MarkForm,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn form_id(req: &Request) -> Result<String, Value> {
    match req.params.get("formId").and_then(|v| v.as_str()) {
        Some(v) => Ok(v.to_string()),
        None => Err(err(&req.id, "bad_params", "missing formId", None)),
    }
}

fn lookup<'a>(state: &'a AppState, req: &Request, id: &str) -> Result<&'a MarkForm, Value> {
    state.forms.get(id).ok_or_else(|| {
        err(
            &req.id,
            "not_found",
            "form not found",
            Some(json!({ "formId": id })),
        )
    })
}

fn parse_header_patch(req: &Request, raw: &Value) -> Result<HeaderPatch, Value> {
    serde_json::from_value::<HeaderPatch>(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid header: {}", e), None))
}

/// Inputs arrive as typed text; numbers and null are accepted for convenience.
fn raw_value(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => None,
    }
}

fn apply(
    state: &mut AppState,
    req: &Request,
    id: &str,
    action: FormAction,
) -> Result<Option<FieldOutcome>, Value> {
    let form = lookup(state, req, id)?;
    let transition = reduce(form, action, &state.config).map_err(|e| marks_err(&req.id, &e))?;
    state.forms.insert(id.to_string(), transition.form);
    Ok(transition.field)
}

fn form_result(state: &AppState, id: &str) -> Value {
    json!({
        "formId": id,
        "form": state.forms.get(id),
    })
}

fn handle_forms_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = Uuid::new_v4().to_string();
    state.forms.insert(id.clone(), MarkForm::default());

    let mut actions = Vec::new();
    if let Some(raw) = req.params.get("header") {
        match parse_header_patch(req, raw) {
            Ok(patch) => actions.push(FormAction::SetHeader(patch)),
            Err(resp) => {
                state.forms.remove(&id);
                return resp;
            }
        }
    }
    if let Some(body) = req.params.get("subjects") {
        match parse_subjects(body) {
            Ok(subjects) => actions.push(FormAction::LoadSubjects(subjects)),
            Err(e) => {
                state.forms.remove(&id);
                return marks_err(&req.id, &e);
            }
        }
    }
    for action in actions {
        if let Err(resp) = apply(state, req, &id, action) {
            state.forms.remove(&id);
            return resp;
        }
    }

    tracing::info!(form_id = %id, "form opened");
    ok(&req.id, form_result(state, &id))
}

fn handle_forms_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = lookup(state, req, &id) {
        return resp;
    }
    ok(&req.id, form_result(state, &id))
}

fn handle_forms_load_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(body) = req.params.get("subjects") else {
        return err(&req.id, "bad_params", "missing subjects", None);
    };
    let subjects = match parse_subjects(body) {
        Ok(v) => v,
        Err(e) => return marks_err(&req.id, &e),
    };
    let count = subjects.len();
    if let Err(resp) = apply(state, req, &id, FormAction::LoadSubjects(subjects)) {
        return resp;
    }
    tracing::debug!(form_id = %id, count, "subjects loaded");
    ok(&req.id, form_result(state, &id))
}

fn handle_forms_set_header(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch = match parse_header_patch(req, raw) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = apply(state, req, &id, FormAction::SetHeader(patch)) {
        return resp;
    }
    ok(&req.id, form_result(state, &id))
}

fn handle_forms_set_field(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index = match req.params.get("index").and_then(|v| v.as_u64()) {
        Some(v) => v as usize,
        None => return err(&req.id, "bad_params", "missing/invalid index", None),
    };
    let Some(field) = req
        .params
        .get("field")
        .and_then(|v| v.as_str())
        .and_then(MarkField::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "field must be one of: external_marks, internal_marks",
            None,
        );
    };
    let Some(raw) = raw_value(req.params.get("value")) else {
        return err(&req.id, "bad_params", "value must be a string or number", None);
    };

    let outcome = match apply(state, req, &id, FormAction::SetField { index, field, raw }) {
        Ok(Some(v)) => v,
        Ok(None) => FieldOutcome::Ignored,
        Err(resp) => return resp,
    };

    let (kind, message) = match &outcome {
        FieldOutcome::Accepted(_) => ("accepted", None),
        FieldOutcome::Cleared => ("cleared", None),
        FieldOutcome::Rejected(m) => ("rejected", Some(m.clone())),
        FieldOutcome::Ignored => ("ignored", None),
    };
    tracing::debug!(form_id = %id, index, field = field.as_str(), outcome = kind, "field edit");

    let value = state
        .forms
        .get(&id)
        .and_then(|f| f.entries.get(index))
        .and_then(|e| e.value(field));
    ok(
        &req.id,
        json!({
            "accepted": outcome.is_applied(),
            "outcome": kind,
            "message": message,
            "value": value,
            "form": state.forms.get(&id),
        }),
    )
}

fn handle_forms_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let errors = match lookup(state, req, &id) {
        Ok(form) => validate_entries(&form.entries, &state.config.rules),
        Err(resp) => return resp,
    };
    tracing::debug!(form_id = %id, errors = errors.len(), "form validated");
    let result = json!({
        "valid": errors.is_empty(),
        "firstMessage": errors.first_message(),
        "errors": errors,
    });
    if let Some(form) = state.forms.get_mut(&id) {
        form.errors = errors;
    }
    ok(&req.id, result)
}

fn handle_forms_build_payload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let built = match lookup(state, req, &id) {
        Ok(form) => build_payload(form, &state.config),
        Err(resp) => return resp,
    };
    match built {
        Ok(payload) => {
            tracing::info!(
                form_id = %id,
                marks = payload.marks.len(),
                terminal = %payload.terminal,
                "submission payload built"
            );
            ok(&req.id, json!({ "payload": payload }))
        }
        Err(e) => {
            tracing::info!(form_id = %id, code = e.code(), message = %e, "submission blocked");
            let resp = marks_err(&req.id, &e);
            // Surface the whole-form errors inline as well.
            if let MarksError::RuleViolation { errors, .. } = e {
                if let Some(form) = state.forms.get_mut(&id) {
                    form.errors = errors;
                }
            }
            resp
        }
    }
}

fn handle_forms_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match lookup(state, req, &id) {
        Ok(form) => ok(
            &req.id,
            json!({ "summary": summarize(&form.entries, &state.config.rules) }),
        ),
        Err(resp) => resp,
    }
}

fn handle_forms_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match form_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if state.forms.remove(&id).is_none() {
        return err(
            &req.id,
            "not_found",
            "form not found",
            Some(json!({ "formId": id })),
        );
    }
    tracing::info!(form_id = %id, "form closed");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.open" => Some(handle_forms_open(state, req)),
        "forms.get" => Some(handle_forms_get(state, req)),
        "forms.loadSubjects" => Some(handle_forms_load_subjects(state, req)),
        "forms.setHeader" => Some(handle_forms_set_header(state, req)),
        "forms.setField" => Some(handle_forms_set_field(state, req)),
        "forms.validate" => Some(handle_forms_validate(state, req)),
        "forms.buildPayload" => Some(handle_forms_build_payload(state, req)),
        "forms.summary" => Some(handle_forms_summary(state, req)),
        "forms.close" => Some(handle_forms_close(state, req)),
        _ => None,
    }
}
