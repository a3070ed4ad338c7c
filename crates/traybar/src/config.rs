use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};

/// Keys that are set unless the config file overrides them.
const DEFAULTS: &[(&str, &str)] = &[("tray-position", "right"), ("background", "#222222")];

/// Read a flat JSON object into the key/value map the tray reads its settings from.
pub fn read_config(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<HashMap<String, String>> {
    let values: HashMap<String, serde_json::Value> = serde_json::from_str(content)?;
    let mut config: HashMap<String, String> = values
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();
    with_defaults(&mut config);
    Ok(config)
}

pub fn with_defaults(config: &mut HashMap<String, String>) {
    for (key, value) in DEFAULTS {
        config.entry(key.to_string()).or_insert_with(|| value.to_string());
    }
}
