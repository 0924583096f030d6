//! Configuration loader with layering support.
//!
//! Merges configuration sources in order: built-in defaults, user global
//! (`~/.codecontext/config.toml`), project file
//! (`.codecontext.toml`/`.codecontext.yaml`), environment overrides
//! (`CODECONTEXT_*`), then CLI overrides. Later sources win; merging is a
//! deep merge over TOML tables so partial files override only the keys
//! they mention.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{project_config_candidates, ConfigOverrides, ContextConfig};

/// Environment variable prefix; `__` nests sections.
const ENV_PREFIX: &str = "CODECONTEXT_";

/// Global configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name under the home directory.
const GLOBAL_CONFIG_DIR: &str = ".codecontext";

/// Layered configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.codecontext`.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
        }
    }

    /// Create a loader with a custom global config directory (testing).
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    /// Path of the global config file, when a home directory exists.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Load the fully merged configuration for a project.
    pub fn load(
        &self,
        project_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ContextConfig, ConfigError> {
        let env: Vec<(String, String)> = std::env::vars().collect();
        self.load_with_env(project_root, overrides, env)
    }

    /// Load with an explicit environment snapshot (testing).
    pub fn load_with_env(
        &self,
        project_root: &Path,
        overrides: Option<&ConfigOverrides>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<ContextConfig, ConfigError> {
        let mut value = toml::Value::try_from(ContextConfig::default())?;

        if let Some(global) = self.load_global_value()? {
            merge_values(&mut value, global);
        }
        if let Some(project) = load_project_value(project_root)? {
            merge_values(&mut value, project);
        }
        apply_env(&mut value, env)?;

        let mut config: ContextConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Validation(e.to_string()))?;

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Write `config` to the global config file, creating the directory.
    pub fn save_global(&self, config: &ContextConfig) -> Result<PathBuf, ConfigError> {
        let Some(ref dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
        }
        let path = dir.join(CONFIG_FILE_NAME);
        let rendered = toml::to_string_pretty(config)?;
        std::fs::write(&path, rendered).map_err(|e| ConfigError::write_file(&path, e))?;
        Ok(path)
    }

    fn load_global_value(&self) -> Result<Option<toml::Value>, ConfigError> {
        let Some(path) = self.global_config_path() else {
            debug!("no home directory, skipping global config");
            return Ok(None);
        };
        if !path.exists() {
            trace!("global config not found at {:?}", path);
            return Ok(None);
        }
        debug!("loading global config from {:?}", path);
        let content =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::read_file(&path, e))?;
        let value = toml::from_str(&content).map_err(|e| ConfigError::parse_toml(&path, e))?;
        Ok(Some(value))
    }
}

/// First existing project config file wins: `.codecontext.toml`, then
/// `.codecontext.yaml`.
fn load_project_value(project_root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    for path in project_config_candidates(project_root) {
        if !path.exists() {
            continue;
        }
        debug!("loading project config from {:?}", path);
        let content =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::read_file(&path, e))?;
        let value = if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&content).map_err(|e| ConfigError::parse_yaml(&path, e))?;
            toml::Value::try_from(yaml)?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::parse_toml(&path, e))?
        };
        return Ok(Some(value));
    }
    Ok(None)
}

/// Deep merge: overlay tables merge into base tables, scalars replace.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Apply `CODECONTEXT_SECTION__KEY[__SUBKEY]` overrides onto the value tree.
fn apply_env(
    value: &mut toml::Value,
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ConfigError> {
    for (variable, raw) in env {
        let Some(rest) = variable.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = rest.split("__").map(|s| s.to_lowercase()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::EnvOverride {
                variable,
                message: "empty path segment".to_string(),
            });
        }
        // Single-segment names like CODECONTEXT_OPENAI_API_KEY are secrets
        // for providers, not config paths.
        if segments.len() < 2 {
            continue;
        }
        set_path(value, &segments, parse_scalar(&raw));
        debug!("applied environment override {}", variable);
    }
    Ok(())
}

fn set_path(value: &mut toml::Value, path: &[String], leaf: toml::Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let toml::Value::Table(table) = value else {
        return;
    };
    if rest.is_empty() {
        table.insert(head.clone(), leaf);
        return;
    }
    let entry = table
        .entry(head.clone())
        .or_insert_with(|| toml::Value::Table(Default::default()));
    set_path(entry, rest, leaf);
}

/// Environment values are strings; recover bool/int/float when they parse.
fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(boolean) = raw.parse::<bool>() {
        return toml::Value::Boolean(boolean);
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return toml::Value::Integer(integer);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return toml::Value::Float(float);
    }
    toml::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmbeddingProviderKind;
    use tempfile::TempDir;

    fn loader_for(temp: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_dir(temp.path().join("global"))
    }

    #[test]
    fn test_defaults_when_nothing_exists() {
        let temp = TempDir::new().unwrap();
        let config = loader_for(&temp)
            .load_with_env(temp.path(), None, Vec::new())
            .unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn test_project_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            "[storage]\nurl = \"http://global:6334\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join(".codecontext.toml"),
            "[storage]\nurl = \"http://project:6334\"\n",
        )
        .unwrap();

        let config = loader_for(&temp)
            .load_with_env(temp.path(), None, Vec::new())
            .unwrap();
        assert_eq!(config.storage.url, "http://project:6334");
        // Untouched global key survives the project layer.
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_yaml_project_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".codecontext.yaml"),
            "search:\n  limit: 25\n",
        )
        .unwrap();
        let config = loader_for(&temp)
            .load_with_env(temp.path(), None, Vec::new())
            .unwrap();
        assert_eq!(config.search.limit, 25);
    }

    #[test]
    fn test_env_overrides_project() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".codecontext.toml"),
            "[embedding]\nprovider = \"hash\"\n",
        )
        .unwrap();
        let env = vec![
            ("CODECONTEXT_EMBEDDING__PROVIDER".to_string(), "openai".to_string()),
            (
                "CODECONTEXT_EMBEDDING__OPENAI__BASE_URL".to_string(),
                "http://localhost:11434/v1".to_string(),
            ),
            ("CODECONTEXT_SEARCH__LIMIT".to_string(), "5".to_string()),
            ("UNRELATED".to_string(), "ignored".to_string()),
        ];
        let config = loader_for(&temp)
            .load_with_env(temp.path(), None, env)
            .unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Openai);
        assert_eq!(
            config.embedding.openai.as_ref().map(|o| o.base_url.as_str()),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(config.search.limit, 5);
    }

    #[test]
    fn test_cli_overrides_beat_env() {
        let temp = TempDir::new().unwrap();
        let env = vec![(
            "CODECONTEXT_STORAGE__URL".to_string(),
            "http://env:6334".to_string(),
        )];
        let overrides = ConfigOverrides {
            store_url: Some("http://cli:6334".to_string()),
            ..Default::default()
        };
        let config = loader_for(&temp)
            .load_with_env(temp.path(), Some(&overrides), env)
            .unwrap();
        assert_eq!(config.storage.url, "http://cli:6334");
    }

    #[test]
    fn test_save_and_reload_global() {
        let temp = TempDir::new().unwrap();
        let loader = loader_for(&temp);
        let mut config = ContextConfig::default();
        config.logging.level = "warn".to_string();
        loader.save_global(&config).unwrap();

        let reloaded = loader.load_with_env(temp.path(), None, Vec::new()).unwrap();
        assert_eq!(reloaded.logging.level, "warn");
    }
}
