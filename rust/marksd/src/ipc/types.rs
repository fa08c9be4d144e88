use std::collections::HashMap;

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::marks::MarkForm;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: EngineConfig,
    /// Open mark-entry forms keyed by form id.
    pub forms: HashMap<String, MarkForm>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            forms: HashMap::new(),
        }
    }
}
