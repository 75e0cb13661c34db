//! # PMOBroadcast Configuration Module
//!
//! Configuration management for the broadcaster:
//! - An embedded default tree (`broadcaster.yaml`) merged with the user's
//!   `config.yaml`
//! - Environment variable overrides (`PMOBROADCAST_CONFIG__HOST__HTTP_PORT=9000`)
//! - Path based getters and setters (`&["broadcast", "hls"]`)
//! - Directories managed relative to the configuration directory
//! - A lazily loaded global instance for binaries
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! let audio_dir = config.get_managed_dir(&["broadcast", "storage", "audio_dir"], "audio")?;
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Library crates usually read a whole subtree and hand it to serde:
//!
//! ```no_run
//! # use pmoconfig::get_config;
//! let hls = get_config().get_value(&["broadcast", "hls"])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = include_str!("broadcaster.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(
        Config::load_config("").expect("Failed to load PMOBroadcast configuration")
    );
}

const ENV_CONFIG_DIR: &str = "PMOBROADCAST_CONFIG";
const ENV_PREFIX: &str = "PMOBROADCAST_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmobroadcast";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_HTTP_PORT: u16 = 8090;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Generates a getter/setter pair for a boolean leaf
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Generates a getter/setter pair for a string leaf
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => s,
                _ => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager
///
/// Holds the merged YAML tree behind a mutex. Instances created with
/// [`Config::load_config`] write every change back to `config.yaml`;
/// instances created with [`Config::from_yaml_str`] live in memory only.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Config {
    /// Loads the configuration stored in `directory`
    ///
    /// An empty `directory` triggers the lookup order:
    /// 1. `PMOBROADCAST_CONFIG` environment variable
    /// 2. `.pmobroadcast` in the current directory
    /// 3. `.pmobroadcast` in the home directory
    /// 4. `.pmobroadcast` created in the current directory
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::resolve_config_dir(directory);
        Self::prepare_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);
        let external = match fs::read_to_string(&path) {
            Ok(text) => {
                info!(config_file = %path.display(), "Loaded config file");
                Some(text)
            }
            Err(_) => {
                info!(config_file = %path.display(), "No config file, using embedded defaults");
                None
            }
        };

        let data = Self::build_tree(external.as_deref())?;
        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(data),
        };
        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document layered over
    /// the embedded defaults. Nothing is written to disk.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Config {
            config_dir: env::temp_dir().join(CONFIG_DIR_NAME),
            path: None,
            data: Mutex::new(Self::build_tree(Some(yaml))?),
        })
    }

    fn build_tree(external: Option<&str>) -> Result<Value> {
        let mut tree: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if let Some(text) = external {
            let overlay: Value = serde_yaml::from_str(text)?;
            merge_yaml(&mut tree, &overlay);
        }
        let mut tree = lowercase_keys(tree);
        apply_env_overrides(&mut tree);
        Ok(tree)
    }

    fn resolve_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }
        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from env");
            return PathBuf::from(from_env);
        }
        let local = PathBuf::from(CONFIG_DIR_NAME);
        if local.exists() {
            return local;
        }
        if let Some(home) = home_dir() {
            let candidate = home.join(CONFIG_DIR_NAME);
            if candidate.exists() {
                return candidate;
            }
        }
        local
    }

    fn prepare_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Directory holding `config.yaml` and the relative managed paths
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Writes the tree back to `config.yaml` (no-op for in-memory configs)
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.lock())?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Returns a clone of the node at `path`
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock();
        let mut node = &*data;
        for (depth, key) in path.iter().enumerate() {
            let Value::Mapping(map) = node else {
                return Err(anyhow!("{} is not a mapping", path[..depth].join(".")));
            };
            node = map
                .get(&Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join(".")))?;
        }
        Ok(node.clone())
    }

    /// Replaces the node at `path`, creating intermediate mappings, then saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock();
            insert_at(&mut data, path, value)?;
        }
        self.save()
    }

    /// Resolves a directory stored at `path`, relative to the config dir
    /// unless absolute, and creates it. Unset paths are initialised with
    /// `default`.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let configured = self.managed_entry(path, default)?;
        let dir = self.absolutize(&configured);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(directory = %dir.display(), "Created managed directory");
        }
        Ok(dir.to_string_lossy().to_string())
    }

    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Like [`Config::get_managed_dir`] but for a file: only its parent
    /// directory is created.
    pub fn get_managed_file(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let configured = self.managed_entry(path, default)?;
        let file = self.absolutize(&configured);
        if let Some(parent) = file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(file)
    }

    fn managed_entry(&self, path: &[&str], default: &str) -> Result<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                Ok(default.to_string())
            }
        }
    }

    fn absolutize(&self, configured: &str) -> PathBuf {
        let candidate = Path::new(configured);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.config_dir.join(candidate)
        }
    }

    /// HTTP port, accepting numbers and numeric strings
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(DEFAULT_HTTP_PORT),
            Ok(Value::String(s)) => s.parse().unwrap_or_else(|_| {
                warn!("Invalid HTTP port '{}', using default {}", s, DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }),
            _ => DEFAULT_HTTP_PORT,
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );
}

/// Returns the global configuration, loading it on first access
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn insert_at(node: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return Ok(());
    };
    let Value::Mapping(map) = node else {
        return Err(anyhow!("Cannot descend into a non-mapping node at '{}'", head));
    };
    let key = Value::String(head.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        return Ok(());
    }
    let child = map
        .entry(key)
        .or_insert(Value::Mapping(Mapping::new()));
    if !child.is_mapping() {
        *child = Value::Mapping(Mapping::new());
    }
    insert_at(child, rest, value)
}

fn apply_env_overrides(tree: &mut Value) {
    for (name, raw) in env::vars() {
        let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = suffix.split("__").collect();
        let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw.clone()));
        if let Err(err) = insert_at(tree, &path, value) {
            warn!(variable = %name, "Ignoring configuration override: {err}");
        }
    }
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (key, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Mappings merge key by key; scalars and sequences from `overlay` win.
fn merge_yaml(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
