//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_BACKEND__HOSTS`). `Config::settings`
//! extracts the typed `Settings` used to wire a backend, store and executor.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pipeline::ExecutionMode;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            // no localhost fallback in production
            let hosts: Option<Vec<String>> = self.get::<HostList>("backend.hosts").ok().map(|h| h.0);
            if hosts.map_or(true, |h| h.is_empty()) {
                anyhow::bail!("backend.hosts must be configured in production");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub pipelines: PipelineSettings,
    #[serde(default)]
    pub executor: ExecutorSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.backend.hosts.is_empty() {
            return Err(Error::InvalidConfig("backend.hosts must not be empty".into()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(Error::InvalidConfig("backend.timeout_secs must be > 0".into()));
        }
        if self.backend.default_collection.is_empty() {
            return Err(Error::InvalidConfig("backend.default_collection must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_hosts", deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_collection")]
    pub default_collection: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: false,
            default_collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_pipelines_dir")]
    pub dir: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { dir: default_pipelines_dir() }
    }
}

impl PipelineSettings {
    /// Pipeline directory after `~`/`$VAR` expansion, relative to `base`.
    pub fn dir_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_hosts() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_collection() -> String {
    "search_products".to_string()
}

fn default_pipelines_dir() -> String {
    "./configs/pipelines".to_string()
}

/// Either a list of hosts or one comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum HostsRepr {
    List(Vec<String>),
    Csv(String),
}

struct HostList(Vec<String>);

impl<'de> Deserialize<'de> for HostList {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let hosts = match HostsRepr::deserialize(d)? {
            HostsRepr::List(v) => v.into_iter().map(|h| h.trim().to_string()).filter(|h| !h.is_empty()).collect(),
            HostsRepr::Csv(s) => s.split(',').map(str::trim).filter(|h| !h.is_empty()).map(String::from).collect(),
        };
        Ok(Self(hosts))
    }
}

fn deserialize_hosts<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    HostList::deserialize(d).map(|h| h.0)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
