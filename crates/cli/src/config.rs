use anyhow::{Context, Result};
use directories::ProjectDirs;
use ipc::Channel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "storefront";

pub const DEFAULT_EXECUTABLE: &str = "./ecommerce";
pub const DEFAULT_REQUEST_FILE: &str = "input.txt";
pub const DEFAULT_RESPONSE_FILE: &str = "output.txt";

pub const KEYS: [&str; 6] = [
    "engine.executable",
    "engine.request_file",
    "engine.response_file",
    "engine.working_dir",
    "engine.timeout_ms",
    "engine.settle_ms",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Where the engine lives and how long to wait for it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub executable: Option<PathBuf>,
    pub request_file: Option<PathBuf>,
    pub response_file: Option<PathBuf>,
    /// Directory the engine runs in; relative paths above resolve against it
    pub working_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub settle_ms: Option<u64>,
}

impl EngineConfig {
    /// Build the transport channel, filling in defaults
    pub fn channel(&self) -> Channel {
        let base = self.working_dir.as_deref();

        // A bare program name is looked up on PATH, like a shell would.
        let executable = self
            .executable
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE));
        let executable = if executable.components().count() > 1 {
            resolve(base, &executable)
        } else {
            executable
        };

        let request = self
            .request_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REQUEST_FILE));
        let response = self
            .response_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESPONSE_FILE));

        let mut channel = Channel::new(executable, resolve(base, &request), resolve(base, &response));
        if let Some(dir) = base {
            channel = channel.with_working_dir(dir);
        }
        if let Some(ms) = self.timeout_ms {
            channel = channel.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.settle_ms {
            channel = channel.with_settle_delay(Duration::from_millis(ms));
        }
        channel
    }
}

fn resolve(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    // STOREFRONT_CONFIG_PATH overrides the default config directory
    if let Ok(path) = std::env::var("STOREFRONT_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_file()?)
}

pub fn load_config_from(config_file: &Path) -> Result<Config> {
    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_file()?)
}

pub fn save_config_to(config: &Config, config_file: &Path) -> Result<()> {
    if let Some(config_dir) = config_file.parent().filter(|dir| !dir.exists()) {
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(config_file, contents)
        .with_context(|| format!("Failed to write config file: {}", config_file.display()))?;

    Ok(())
}

pub fn get_config_value(config: &Config, key: &str) -> Option<String> {
    let engine = &config.engine;
    let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
    match key {
        "engine.executable" => path(&engine.executable),
        "engine.request_file" => path(&engine.request_file),
        "engine.response_file" => path(&engine.response_file),
        "engine.working_dir" => path(&engine.working_dir),
        "engine.timeout_ms" => engine.timeout_ms.map(|ms| ms.to_string()),
        "engine.settle_ms" => engine.settle_ms.map(|ms| ms.to_string()),
        _ => None,
    }
}

pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let engine = &mut config.engine;
    let millis = || {
        value
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of milliseconds, got {value:?}"))
    };
    match key {
        "engine.executable" => engine.executable = Some(PathBuf::from(value)),
        "engine.request_file" => engine.request_file = Some(PathBuf::from(value)),
        "engine.response_file" => engine.response_file = Some(PathBuf::from(value)),
        "engine.working_dir" => engine.working_dir = Some(PathBuf::from(value)),
        "engine.timeout_ms" => engine.timeout_ms = Some(millis()?),
        "engine.settle_ms" => engine.settle_ms = Some(millis()?),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_channel() {
        let channel = EngineConfig::default().channel();
        assert_eq!(channel.executable(), Path::new(DEFAULT_EXECUTABLE));
        assert_eq!(channel.request_path(), Path::new("input.txt"));
        assert_eq!(channel.response_path(), Path::new("output.txt"));
        assert_eq!(channel.working_dir(), None);
        assert_eq!(channel.timeout(), ipc::DEFAULT_TIMEOUT);
        assert_eq!(channel.settle_delay(), ipc::DEFAULT_SETTLE_DELAY);
    }

    #[test]
    fn test_relative_paths_resolve_against_working_dir() {
        let engine = EngineConfig {
            executable: Some(PathBuf::from("bin/ecommerce")),
            request_file: Some(PathBuf::from("in.txt")),
            response_file: Some(PathBuf::from("/tmp/out.txt")),
            working_dir: Some(PathBuf::from("/srv/shop")),
            timeout_ms: Some(2500),
            settle_ms: Some(0),
        };
        let channel = engine.channel();
        assert_eq!(channel.executable(), Path::new("/srv/shop/bin/ecommerce"));
        assert_eq!(channel.request_path(), Path::new("/srv/shop/in.txt"));
        assert_eq!(channel.response_path(), Path::new("/tmp/out.txt"));
        assert_eq!(channel.working_dir(), Some(Path::new("/srv/shop")));
        assert_eq!(channel.timeout(), Duration::from_millis(2500));
        assert_eq!(channel.settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_bare_executable_name_is_left_for_path_lookup() {
        let engine = EngineConfig {
            executable: Some(PathBuf::from("ecommerce")),
            working_dir: Some(PathBuf::from("/srv/shop")),
            ..Default::default()
        };
        assert_eq!(engine.channel().executable(), Path::new("ecommerce"));
    }

    #[test]
    fn test_set_and_get_values() {
        let mut config = Config::default();
        set_config_value(&mut config, "engine.working_dir", "/srv/shop").unwrap();
        set_config_value(&mut config, "engine.timeout_ms", "8000").unwrap();

        assert_eq!(
            get_config_value(&config, "engine.working_dir").as_deref(),
            Some("/srv/shop")
        );
        assert_eq!(get_config_value(&config, "engine.timeout_ms").as_deref(), Some("8000"));
        assert_eq!(get_config_value(&config, "engine.settle_ms"), None);

        assert!(set_config_value(&mut config, "engine.settle_ms", "soon").is_err());
        assert!(set_config_value(&mut config, "engine.color", "blue").is_err());
    }

    #[test]
    fn test_every_key_is_settable() {
        let mut config = Config::default();
        for key in KEYS {
            set_config_value(&mut config, key, "10").unwrap();
            assert_eq!(get_config_value(&config, key).as_deref(), Some("10"), "{key}");
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("config.toml");

        assert!(load_config_from(&file).unwrap().engine.executable.is_none());

        let mut config = Config::default();
        set_config_value(&mut config, "engine.executable", "/opt/shop/ecommerce").unwrap();
        set_config_value(&mut config, "engine.settle_ms", "50").unwrap();
        save_config_to(&config, &file).unwrap();

        let loaded = load_config_from(&file).unwrap();
        assert_eq!(loaded.engine.executable, Some(PathBuf::from("/opt/shop/ecommerce")));
        assert_eq!(loaded.engine.settle_ms, Some(50));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[engine]\ntimeout_ms = \"slow\"\n").unwrap();

        let err = load_config_from(&file).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
