use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_settings;
use crate::core::errors::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "credential",
    "bearer",
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    /// Loads `config.yml`, overlays `secrets.yaml`, then environment overrides.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let public_config = load_yaml_file(&self.paths.config_path)?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        let merged = deep_merge(&public_config, &secrets_config);

        let mut settings: Settings =
            serde_json::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))?;
        apply_env_overrides(&mut settings, |key| env::var(key).ok())?;

        if settings.corpus.data_dir.is_none() {
            settings.corpus.data_dir = Some(self.paths.default_data_dir.clone());
        }

        validate_settings(&settings)?;

        if let Ok(value) = serde_json::to_value(&settings) {
            tracing::debug!("Effective settings: {}", redact_sensitive_values(&value));
        }

        Ok(settings)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    let value = serde_yaml::from_str::<Value>(&contents)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Parse(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

/// Environment variables the deployment sets through `.env`.
pub(crate) fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("OPENAI_API_KEY") {
        settings.llm.api_key = key;
    }
    if let Some(url) = non_empty("OPENAI_BASE_URL") {
        settings.llm.base_url = url;
    }
    if let Some(model) = non_empty("LLM_MODEL") {
        settings.llm.model = model;
    }
    if let Some(model) = non_empty("EMBEDDING_MODEL") {
        settings.llm.embedding_model = model;
    }
    if let Some(dir) = non_empty("STUDY_DATA_DIR") {
        settings.corpus.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(file) = non_empty("PAST_QUESTION_FILE") {
        settings.crew.past_question_file = Some(PathBuf::from(file));
    }
    if let Some(file) = non_empty("MAIN_MATERIAL_FILE") {
        settings.crew.main_material_file = Some(PathBuf::from(file));
    }
    if let Some(port) = non_empty("PORT") {
        settings.server.port = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {}", port)))?;
    }

    Ok(())
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
