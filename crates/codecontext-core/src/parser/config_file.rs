//! Configuration file parser.
//!
//! Flattens JSON/YAML/TOML files into `config_key` document nodes, one per
//! leaf key, with dotted key paths and detected environment-variable
//! references recorded in metadata.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{DocumentNode, DocumentNodeType};
use crate::parser::ParseError;

/// Supported configuration formats, detected by extension/filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())?.to_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
        }
    }
}

/// Parse a config file into one `config_key` node per leaf key.
pub fn parse_config(
    format: ConfigFormat,
    file_path: &str,
    source: &str,
) -> Result<Vec<DocumentNode>, ParseError> {
    let value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(source).map_err(|e| ParseError::InvalidConfig {
            format: "json",
            path: file_path.to_string(),
            message: e.to_string(),
        })?,
        ConfigFormat::Yaml => serde_yaml::from_str(source).map_err(|e| ParseError::InvalidConfig {
            format: "yaml",
            path: file_path.to_string(),
            message: e.to_string(),
        })?,
        ConfigFormat::Toml => {
            let parsed: toml::Value =
                toml::from_str(source).map_err(|e| ParseError::InvalidConfig {
                    format: "toml",
                    path: file_path.to_string(),
                    message: e.to_string(),
                })?;
            serde_json::to_value(parsed).map_err(|e| ParseError::InvalidConfig {
                format: "toml",
                path: file_path.to_string(),
                message: e.to_string(),
            })?
        }
    };

    let mut leaves = Vec::new();
    flatten("", &value, &mut leaves);

    let nodes = leaves
        .into_iter()
        .map(|(key, rendered)| {
            let line = line_of_key(source, &key);
            let mut node = DocumentNode::new(
                DocumentNodeType::ConfigKey,
                format!("{} = {}", key, rendered),
                file_path,
                line,
                line,
            );
            node.metadata
                .insert("config_key".into(), serde_json::json!(key));
            node.metadata
                .insert("config_value".into(), serde_json::json!(rendered));
            node.metadata
                .insert("format".into(), serde_json::json!(format.as_str()));
            let env_refs = env_references(&rendered);
            if !env_refs.is_empty() {
                node.metadata
                    .insert("env_references".into(), serde_json::json!(env_refs));
            }
            node
        })
        .collect();
    Ok(nodes)
}

/// Depth-first flatten to dotted leaf keys; arrays index with `[n]`.
fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", prefix, index), child, out);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                let rendered = match leaf {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push((prefix.to_string(), rendered));
            }
        }
    }
}

/// Best-effort line stamp: first line mentioning the key's last segment.
fn line_of_key(source: &str, dotted_key: &str) -> u32 {
    let last = dotted_key
        .rsplit('.')
        .next()
        .map(|s| s.split('[').next().unwrap_or(s))
        .unwrap_or(dotted_key);
    for (index, line) in source.lines().enumerate() {
        if line.contains(last) {
            return index as u32 + 1;
        }
    }
    1
}

fn env_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}|\$([A-Z_][A-Z0-9_]*)").expect("env regex")
    })
}

/// Environment variable names referenced in a config value.
fn env_references(value: &str) -> Vec<String> {
    let mut refs: Vec<String> = env_regex()
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .collect();
    refs.sort();
    refs.dedup();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_flattening() {
        let source = "[database]\nurl = \"postgres://localhost\"\npool_size = 10\n";
        let nodes = parse_config(ConfigFormat::Toml, "app.toml", source).unwrap();
        assert!(nodes
            .iter()
            .any(|n| n.content == "database.url = postgres://localhost"));
        assert!(nodes.iter().any(|n| n.content == "database.pool_size = 10"));
        assert!(nodes.iter().all(|n| n.node_type == DocumentNodeType::ConfigKey));
    }

    #[test]
    fn test_yaml_env_reference() {
        let source = "gateway:\n  api_key: ${PAYMENT_API_KEY}\n  url: https://pay.example.com\n";
        let nodes = parse_config(ConfigFormat::Yaml, "gateway.yaml", source).unwrap();
        let key_node = nodes
            .iter()
            .find(|n| n.content.contains("api_key"))
            .unwrap();
        let refs = key_node
            .metadata
            .get("env_references")
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(refs[0].as_str(), Some("PAYMENT_API_KEY"));
    }

    #[test]
    fn test_json_arrays() {
        let source = r#"{"zones": ["us-east", "eu-west"], "retries": 3}"#;
        let nodes = parse_config(ConfigFormat::Json, "cfg.json", source).unwrap();
        assert!(nodes.iter().any(|n| n.content == "zones[0] = us-east"));
        assert!(nodes.iter().any(|n| n.content == "retries = 3"));
    }

    #[test]
    fn test_invalid_input_errors() {
        assert!(parse_config(ConfigFormat::Json, "bad.json", "{not json").is_err());
        assert!(parse_config(ConfigFormat::Toml, "bad.toml", "= nope").is_err());
    }

    #[test]
    fn test_line_stamps() {
        let source = "[server]\nhost = \"localhost\"\nport = 8080\n";
        let nodes = parse_config(ConfigFormat::Toml, "srv.toml", source).unwrap();
        let port = nodes.iter().find(|n| n.content.contains("port")).unwrap();
        assert_eq!(port.start_line, 3);
    }

    #[test]
    fn test_format_detection() {
        use std::path::Path;
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.md")), None);
    }
}
