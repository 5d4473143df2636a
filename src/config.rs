//! Layered configuration.
//!
//! Defaults, then the optional `config.yml`, then environment variables,
//! then command-line overrides. The API base URL is read from the first
//! of `JOTTER_API_URL` / `NOTES_API_URL` that is set and non-blank.

use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_URL_VARS: [&str; 2] = ["JOTTER_API_URL", "NOTES_API_URL"];
pub const FEATURES_VAR: &str = "JOTTER_FEATURES";
pub const LOG_LEVEL_VAR: &str = "JOTTER_LOG";
pub const CONFIG_PATH_VAR: &str = "JOTTER_CONFIG";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_FALLBACK_LATENCY_MS: u64 = 250;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error")]
    LogLevel(String),
}

/// Comma-separated feature switches, e.g. `fallback,beta`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags(Vec<String>);

impl FeatureFlags {
    pub fn parse(raw: &str) -> Self {
        let mut flags = Vec::new();
        for flag in raw.split(',') {
            let flag = flag.trim().to_ascii_lowercase();
            if !flag.is_empty() && !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        FeatureFlags(flags)
    }

    pub fn from_list(items: &[String]) -> Self {
        Self::parse(&items.join(","))
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.0.iter().any(|f| f == name)
    }

    pub fn fallback(&self) -> bool {
        self.enabled("fallback")
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub features: Option<Vec<String>>,
    pub fallback_latency_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub features: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Empty means no remote backend.
    pub api_url: String,
    pub features: FeatureFlags,
    pub fallback_latency: Duration,
    pub request_timeout: Duration,
    pub log_level: String,
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: String::new(),
            features: FeatureFlags::default(),
            fallback_latency: Duration::from_millis(DEFAULT_FALLBACK_LATENCY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            source: None,
        }
    }
}

impl Config {
    pub fn load(overrides: &Overrides) -> Result<Config, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = env(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .or_else(default_config_path);
        let file = match &path {
            Some(p) if p.exists() => Some((read_file(p)?, p.clone())),
            _ => None,
        };
        Config::resolve(file, env, overrides)
    }

    pub fn resolve<E>(
        file: Option<(FileConfig, PathBuf)>,
        env: E,
        overrides: &Overrides,
    ) -> Result<Config, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some((file, path)) = file {
            if let Some(url) = file.api_url {
                config.api_url = url;
            }
            if let Some(features) = file.features {
                config.features = FeatureFlags::from_list(&features);
            }
            if let Some(ms) = file.fallback_latency_ms {
                config.fallback_latency = Duration::from_millis(ms);
            }
            if let Some(secs) = file.request_timeout_secs {
                config.request_timeout = Duration::from_secs(secs);
            }
            if let Some(level) = file.log_level {
                config.log_level = level;
            }
            config.source = Some(path);
        }

        if let Some(url) = API_URL_VARS
            .iter()
            .filter_map(|key| env(key))
            .find(|v| !v.trim().is_empty())
        {
            config.api_url = url;
        }
        if let Some(raw) = env(FEATURES_VAR) {
            config.features = FeatureFlags::parse(&raw);
        }
        if let Some(level) = env(LOG_LEVEL_VAR) {
            config.log_level = level;
        }

        if let Some(url) = &overrides.api_url {
            config.api_url = url.clone();
        }
        if let Some(raw) = &overrides.features {
            config.features = FeatureFlags::parse(raw);
        }
        if let Some(level) = &overrides.log_level {
            config.log_level = level.clone();
        }

        config.api_url = config.api_url.trim().trim_end_matches('/').to_string();
        config.log_level = normalize_level(&config.log_level)?.to_string();
        Ok(config)
    }

    pub fn api_base(&self) -> Option<&str> {
        if self.api_url.is_empty() {
            None
        } else {
            Some(&self.api_url)
        }
    }
}

pub fn normalize_level(level: &str) -> Result<&'static str, ConfigError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(ConfigError::LogLevel(other.to_string())),
    }
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "jotter")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.yml"))
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_have_no_backend_and_no_fallback() {
        let config = Config::resolve(None, env_of(&[]), &Overrides::default()).expect("resolve");
        assert_eq!(config.api_base(), None);
        assert!(!config.features.fallback());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn first_api_url_variable_wins() {
        let env = env_of(&[
            ("JOTTER_API_URL", "http://primary/"),
            ("NOTES_API_URL", "http://secondary"),
        ]);
        let config = Config::resolve(None, env, &Overrides::default()).expect("resolve");
        assert_eq!(config.api_base(), Some("http://primary"));

        let env = env_of(&[("JOTTER_API_URL", "  "), ("NOTES_API_URL", "http://secondary")]);
        let config = Config::resolve(None, env, &Overrides::default()).expect("resolve");
        assert_eq!(config.api_base(), Some("http://secondary"));
    }

    #[test]
    fn feature_flags_parse_comma_list() {
        let flags = FeatureFlags::parse(" Fallback, ,beta,fallback");
        assert!(flags.fallback());
        assert!(flags.enabled("beta"));
        assert_eq!(flags.names().len(), 2);
        assert!(!FeatureFlags::parse("fallbacks").fallback());
    }

    #[test]
    fn layers_apply_in_order() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "api_url: http://from-file\nfeatures: [fallback]\nfallback_latency_ms: 5\nlog_level: debug"
        )
        .expect("write config");
        let parsed = read_file(file.path()).expect("read config");

        let env = env_of(&[("JOTTER_FEATURES", "beta")]);
        let overrides = Overrides {
            log_level: Some("WARNING".into()),
            ..Overrides::default()
        };
        let config = Config::resolve(Some((parsed, file.path().to_path_buf())), env, &overrides)
            .expect("resolve");
        assert_eq!(config.api_base(), Some("http://from-file"));
        assert!(!config.features.fallback());
        assert!(config.features.enabled("beta"));
        assert_eq!(config.fallback_latency, Duration::from_millis(5));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn unknown_keys_and_levels_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "api_link: http://typo").expect("write config");
        assert!(matches!(
            read_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let overrides = Overrides {
            log_level: Some("loud".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(None, env_of(&[]), &overrides),
            Err(ConfigError::LogLevel(_))
        ));
    }
}
