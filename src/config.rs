//! Engine configuration and its layered loader.
//!
//! Built-in defaults, then YAML files, then `STEPWRIGHT__SECTION__KEY`
//! variables, then the `STEPWRIGHT_CONFIG_JSON` blob. Every overlay must name
//! a path that exists in the default tree.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use action_compiler::CompilerConfig;
use action_flow::PolicyConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwright_evidence_store::CaptureConfig;
use stepwright_privacy::PrivacyConfig;
use tracing::debug;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "STEPWRIGHT__";
pub const ENV_JSON: &str = "STEPWRIGHT_CONFIG_JSON";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// A lock older than this is treated as abandoned
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 900,
        }
    }
}

impl LockConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent of every run directory
    pub runs_root: PathBuf,
    pub policy: PolicyConfig,
    pub capture: CaptureConfig,
    pub privacy: PrivacyConfig,
    pub compiler: CompilerConfig,
    pub lock: LockConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runs_root: PathBuf::from("runs"),
            policy: PolicyConfig::default(),
            capture: CaptureConfig::default(),
            privacy: PrivacyConfig::default(),
            compiler: CompilerConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Files that do not exist are skipped
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Defaults, an optional file that must exist, then the environment
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        options.paths.push(path.to_path_buf());
    }
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<EngineConfig, ConfigError> {
    let mut tree = serde_json::to_value(EngineConfig::default())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            apply_overlays(&mut tree, overlays_from_file(path)?)?;
        }
    }

    if options.include_env {
        apply_overlays(&mut tree, overlays_from_vars(env::vars())?)?;
    }

    serde_json::from_value(tree).map_err(|err| ConfigError::Invalid(err.to_string()))
}

struct ConfigOverlay {
    path: String,
    value: Value,
}

fn apply_overlays(tree: &mut Value, overlays: Vec<ConfigOverlay>) -> Result<(), ConfigError> {
    for overlay in overlays {
        debug!(path = %overlay.path, "config override");
        apply_override(tree, &overlay.path, overlay.value)?;
    }
    Ok(())
}

/// Replace the value at dotted `path`; the path must already exist
fn apply_override(tree: &mut Value, path: &str, value: Value) -> Result<(), ConfigError> {
    let unsupported = || ConfigError::UnsupportedPath(path.to_string());
    let mut segments = path.split('.').peekable();
    let mut node = tree;
    while let Some(segment) = segments.next() {
        let Value::Object(map) = node else {
            return Err(unsupported());
        };
        let slot = map.get_mut(segment).ok_or_else(unsupported)?;
        if segments.peek().is_none() {
            *slot = value;
            return Ok(());
        }
        node = slot;
    }
    Err(unsupported())
}

fn overlays_from_file(path: &Path) -> Result<Vec<ConfigOverlay>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, None))
}

/// Prefixed variables first, then the JSON blob
fn overlays_from_vars(
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<Vec<ConfigOverlay>, ConfigError> {
    let mut overlays = Vec::new();
    let mut blob = None;
    for (key, raw) in vars {
        if key == ENV_JSON {
            blob = Some(raw);
            continue;
        }
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push(ConfigOverlay {
            path,
            value: parse_env_value(&raw),
        });
    }
    // env iteration order is unspecified
    overlays.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(raw_json) = blob.filter(|raw| !raw.trim().is_empty()) {
        let json_value: Value =
            serde_json::from_str(&raw_json).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        overlays.extend(flatten_value(json_value, None));
    }
    Ok(overlays)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

/// Objects recurse; arrays and scalars are leaves
fn flatten_value(value: Value, prefix: Option<String>) -> Vec<ConfigOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key_segment}"),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix)));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![ConfigOverlay { path, value: other }],
            None => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::RunMode;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn overlaid(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let mut tree = serde_json::to_value(EngineConfig::default()).unwrap();
        apply_overlays(&mut tree, overlays_from_vars(vars(pairs))?)?;
        serde_json::from_value(tree).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.policy.retries_per_action, 2);
        assert_eq!(config.policy.recovery_max, 2);
        assert_eq!(config.policy.same_state_revisits, 3);
        assert_eq!(config.policy.hard_cap_steps, 200);
        assert_eq!(config.policy.mode, RunMode::Deterministic);
        assert_eq!(config.compiler.wait_poll_interval_ms, 250);
        assert_eq!(config.lock.stale_after(), Duration::from_secs(900));
    }

    #[test]
    fn test_env_variables_and_blob() {
        let config = overlaid(&[
            ("STEPWRIGHT__POLICY__RETRIES_PER_ACTION", "5"),
            ("STEPWRIGHT__POLICY__MODE", "interactive"),
            ("STEPWRIGHT__POLICY__BACKOFF_MS", "[10, 20]"),
            ("STEPWRIGHT__RUNS_ROOT", "/var/runs"),
            ("UNRELATED", "1"),
            (ENV_JSON, r#"{"policy": {"retries_per_action": 7}}"#),
        ])
        .unwrap();
        // blob is applied last
        assert_eq!(config.policy.retries_per_action, 7);
        assert_eq!(config.policy.mode, RunMode::Interactive);
        assert_eq!(config.policy.backoff_ms, vec![10, 20]);
        assert_eq!(config.runs_root, PathBuf::from("/var/runs"));
    }

    #[test]
    fn test_unknown_path_is_rejected() {
        let err = overlaid(&[("STEPWRIGHT__POLICY__RETRY_FOREVER", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedPath(path) if path == "policy.retry_forever"));

        let err = overlaid(&[("STEPWRIGHT__LOCK__STALE_AFTER_SECS__INNER", "1")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedPath(_)));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let err = overlaid(&[("STEPWRIGHT__POLICY__HARD_CAP_STEPS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_yaml_file_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwright.yaml");
        fs::write(
            &path,
            "runs_root: /srv/runs\npolicy:\n  hard_cap_steps: 40\n  allow_reload_once: false\ncompiler:\n  default_timeout_ms: 3000\n",
        )
        .unwrap();
        let config = load_config_with_options(&LoadOptions {
            paths: vec![path, dir.path().join("missing.yaml")],
            include_env: false,
        })
        .unwrap();
        assert_eq!(config.runs_root, PathBuf::from("/srv/runs"));
        assert_eq!(config.policy.hard_cap_steps, 40);
        assert!(!config.policy.allow_reload_once);
        assert_eq!(config.compiler.default_timeout_ms, 3000);
        assert_eq!(config.policy.retries_per_action, 2);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial]
    fn test_process_environment_is_read() {
        env::set_var("STEPWRIGHT__POLICY__RECOVERY_MAX", "4");
        let config = load_config(None);
        env::remove_var("STEPWRIGHT__POLICY__RECOVERY_MAX");
        assert_eq!(config.unwrap().policy.recovery_max, 4);
    }
}
