use crate::config::{EngineConfig, RuleConfig, TerminalConfig};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn parse_u32_range(v: &Value, key: &str, min: u32, max: u32) -> Result<u32, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be a non-negative integer", key))?;
    if !(u64::from(min)..=u64::from(max)).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n as u32)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() || s.len() > max_len {
        return Err(format!("{} length must be 1..={}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_aliases(v: &Value) -> Result<BTreeMap<String, String>, String> {
    let obj = v
        .as_object()
        .ok_or_else(|| "terminals.aliases must be an object".to_string())?;
    let mut out = BTreeMap::new();
    for (alias, canonical) in obj {
        let canonical = parse_string_max(canonical, alias, 32)?;
        out.insert(alias.clone(), canonical);
    }
    Ok(out)
}

fn section<'a>(v: &'a Value, key: &str) -> Result<&'a Map<String, Value>, String> {
    v.as_object().ok_or_else(|| format!("{} must be an object", key))
}

fn merge_rules_patch(rules: &mut RuleConfig, patch: &Map<String, Value>) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "drawing_keyword" => {
                rules.drawing_keyword = parse_string_max(v, k, 32)?;
            }
            "regular_external_max" => {
                rules.regular_external_max = parse_u32_range(v, k, 1, 1000)?;
            }
            "drawing_external_max" => {
                rules.drawing_external_max = parse_u32_range(v, k, 1, 1000)?;
            }
            "internal_max" => {
                rules.internal_max = parse_u32_range(v, k, 1, 1000)?;
            }
            _ => return Err(format!("unknown config field: rules.{}", k)),
        }
    }
    Ok(())
}

fn merge_terminals_patch(
    terminals: &mut TerminalConfig,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "aliases" => terminals.aliases = parse_aliases(v)?,
            _ => return Err(format!("unknown config field: terminals.{}", k)),
        }
    }
    Ok(())
}

/// Merges a patch shaped like `config.get`'s `config` object, key by key.
fn merge_config_patch(
    current: &mut EngineConfig,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "rules" => merge_rules_patch(&mut current.rules, section(v, k)?)?,
            "terminals" => merge_terminals_patch(&mut current.terminals, section(v, k)?)?,
            _ => return Err(format!("unknown config field: {}", k)),
        }
    }
    current.normalize();
    current.validate().map_err(|e| e.to_string())
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "config": state.config }))
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    // Work on a copy so a bad patch leaves the live config untouched.
    let mut next = state.config.clone();
    if let Err(msg) = merge_config_patch(&mut next, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    tracing::info!(
        regular_external_max = next.rules.regular_external_max,
        drawing_external_max = next.rules.drawing_external_max,
        internal_max = next.rules.internal_max,
        "engine config updated"
    );
    state.config = next;
    ok(&req.id, json!({ "config": state.config }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(handle_config_get(state, req)),
        "config.update" => Some(handle_config_update(state, req)),
        _ => None,
    }
}
