#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use polyguard_core::{AdvisoryPolicy, DeviceDescriptor};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG: &str = "polyguard.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(polyguard::config))]
pub struct ConfigError {
    pub message: String,
}

/// Contents of `polyguard.toml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub advisory: AdvisoryPolicy,
    /// Concrete values for kernel parameters.
    pub parameters: BTreeMap<String, i64>,
    pub device: Option<DeviceDescriptor>,
}

impl Config {
    /// Command-line values win over the file.
    pub fn with_overrides(mut self, overrides: &[(String, i64)]) -> Self {
        for (name, value) in overrides {
            self.parameters.insert(name.clone(), *value);
        }
        self
    }
}

/// Load `path`, or `polyguard.toml` in the working directory when no path
/// is given. A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path: PathBuf = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG), Path::to_path_buf);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError {
        message: format!("failed to parse {}: {e}", path.display()),
    })
}

/// `name=value` from the command line.
pub fn parse_param(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for '{name}': {e}"))?;
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyguard_core::LocalMemType;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.advisory, AdvisoryPolicy::default());
        assert!(cfg.parameters.is_empty());
        assert!(cfg.device.is_none());
    }

    #[test]
    fn reads_every_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        fs::write(
            &path,
            r#"
[advisory]
kill_level_min = 4

[parameters]
n = 1024

[device]
max_work_item_dimensions = 3
max_work_item_sizes = [1024, 1024, 64]
max_work_group_size = 1024
local_mem_size = 49152
local_mem_type = "global"
max_constant_args = 8
"#,
        )
        .unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.advisory.kill_level_min, 4);
        assert_eq!(cfg.advisory.warn_level_min, 1);
        assert_eq!(cfg.parameters["n"], 1024);
        let dev = cfg.device.expect("device section");
        assert_eq!(dev.local_mem_type, LocalMemType::Global);
        assert_eq!(dev.max_work_item_sizes, vec![1024, 1024, 64]);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[advisory]\nkill_level_min = \"high\"\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.message.contains("bad.toml"), "{}", err.message);
    }

    #[test]
    fn command_line_parameters_override_the_file() {
        let cfg = Config {
            parameters: BTreeMap::from([("n".to_string(), 16)]),
            ..Config::default()
        }
        .with_overrides(&[("n".to_string(), 64), ("m".to_string(), 2)]);
        assert_eq!(cfg.parameters["n"], 64);
        assert_eq!(cfg.parameters["m"], 2);
    }

    #[test]
    fn param_syntax() {
        assert_eq!(parse_param("n=32"), Ok(("n".to_string(), 32)));
        assert!(parse_param("n").is_err());
        assert!(parse_param("=3").is_err());
        assert!(parse_param("n=x").unwrap_err().contains("'n'"));
    }
}
