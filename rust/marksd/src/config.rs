use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{MarksError, Result};

const CAP_MIN: u32 = 1;
const CAP_MAX: u32 = 1000;
const KEYWORD_MAX_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RuleConfig,
    pub terminals: TerminalConfig,
}

/// Caps applied by the subject rule resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Case-insensitive substring that marks a subject as a Drawing subject.
    pub drawing_keyword: String,
    pub regular_external_max: u32,
    pub drawing_external_max: u32,
    pub internal_max: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            drawing_keyword: "drawing".to_string(),
            regular_external_max: 80,
            drawing_external_max: 50,
            internal_max: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Lowercase alias -> canonical terminal name.
    pub aliases: BTreeMap<String, String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        let aliases = [
            ("first", "First"),
            ("second", "Second"),
            ("third", "Third"),
            ("annual", "Annual"),
            ("final", "Annual"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { aliases }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(raw).map_err(|e| MarksError::Config {
            message: e.to_string(),
        })?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MarksError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Lowercases the keyword and alias keys; trims alias values.
    pub fn normalize(&mut self) {
        self.rules.drawing_keyword = self.rules.drawing_keyword.trim().to_lowercase();
        self.terminals.aliases = std::mem::take(&mut self.terminals.aliases)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        let keyword = &self.rules.drawing_keyword;
        if keyword.is_empty() || keyword.len() > KEYWORD_MAX_LEN {
            return Err(MarksError::Config {
                message: format!(
                    "drawing_keyword must be 1..={} characters",
                    KEYWORD_MAX_LEN
                ),
            });
        }
        for (field, cap) in [
            ("regular_external_max", self.rules.regular_external_max),
            ("drawing_external_max", self.rules.drawing_external_max),
            ("internal_max", self.rules.internal_max),
        ] {
            if !(CAP_MIN..=CAP_MAX).contains(&cap) {
                return Err(MarksError::Config {
                    message: format!("{} must be in {}..={}", field, CAP_MIN, CAP_MAX),
                });
            }
        }
        for (alias, canonical) in &self.terminals.aliases {
            if alias.is_empty() || canonical.is_empty() {
                return Err(MarksError::Config {
                    message: "terminal aliases must not be blank".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_school_rules() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.rules.regular_external_max, 80);
        assert_eq!(cfg.rules.drawing_external_max, 50);
        assert_eq!(cfg.rules.internal_max, 20);
        assert_eq!(cfg.terminals.aliases.get("final").map(String::as_str), Some("Annual"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [rules]
            regular_external_max = 75

            [terminals.aliases]
            " Mid " = "Second"
            "#,
        )
        .expect("parse config");
        assert_eq!(cfg.rules.regular_external_max, 75);
        assert_eq!(cfg.rules.drawing_keyword, "drawing");
        assert_eq!(cfg.terminals.aliases.get("mid").map(String::as_str), Some("Second"));
        // Replacing the alias table drops the built-in aliases.
        assert!(!cfg.terminals.aliases.contains_key("final"));
    }

    #[test]
    fn rejects_out_of_range_caps() {
        let err = EngineConfig::from_toml_str("[rules]\ninternal_max = 0\n").unwrap_err();
        assert!(err.to_string().contains("internal_max"));
    }

    #[test]
    fn rejects_blank_keyword() {
        let err = EngineConfig::from_toml_str("[rules]\ndrawing_keyword = \"  \"\n").unwrap_err();
        assert!(matches!(err, MarksError::Config { .. }));
    }
}
