//! Application settings.
//!
//! Settings come from a JSON config file plus environment overrides, with
//! the environment winning. The result is an immutable [`Settings`] value
//! constructed once at startup and passed explicitly to whatever needs it;
//! there is no process-wide config cache, so a restart is the only way a
//! changed environment takes effect - and that is visible, not silent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default delay between retries of transient network failures.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;

/// Errors produced while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read config file [{path}]: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("config file [{path}] is not valid JSON: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("missing {key} in config file ({config_key}) or environment ({env_var})")]
    Missing {
        key: &'static str,
        config_key: &'static str,
        env_var: &'static str,
    },

    #[error("invalid value [{value}] for {env_var}: {message}")]
    BadValue {
        env_var: &'static str,
        value: String,
        message: String,
    },

    #[error("input and output paths must differ (both are [{}])", path.display())]
    PathsEqual { path: PathBuf },

    #[error("work directory [{}] must be disjoint from the input root [{}]", work.display(), input.display())]
    WorkOverlapsInput { work: PathBuf, input: PathBuf },
}

/// Filesystem roots.
#[derive(Debug, Clone, Serialize)]
pub struct PathSettings {
    /// Flat directory of source media, read by ingest and workers.
    pub input: PathBuf,
    /// Root of the output tree: `<output>/<profile>/<name>`.
    pub output: PathBuf,
    /// Worker scratch directory; must be disjoint from the input root.
    pub work: PathBuf,
    /// Coordinator record store (SQLite file).
    pub database: PathBuf,
}

/// RabbitMQ connection parameters.
#[derive(Debug, Clone, Serialize)]
pub struct RabbitSettings {
    pub broker: String,
    pub broker_port: u16,
    pub queue: String,
}

impl RabbitSettings {
    /// AMQP URI for the broker.
    pub fn amqp_uri(&self) -> String {
        format!("amqp://{}:{}/%2f", self.broker, self.broker_port)
    }
}

/// Coordinator HTTP parameters.
#[derive(Debug, Clone, Serialize)]
pub struct HttpSettings {
    /// Socket address the coordinator binds.
    pub bind: String,
    /// Base URL workers can reach the coordinator at; used to build the
    /// task URLs embedded in queue envelopes.
    pub public_url: String,
}

/// Behavior flags.
#[derive(Debug, Clone, Serialize)]
pub struct Flags {
    /// Unlink the source file from disk once its encode artifact has been
    /// persisted. Off by default so metric tasks over the same source can
    /// still run.
    pub auto_delete: bool,
}

/// Fully resolved application settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub paths: PathSettings,
    pub rabbitmq: RabbitSettings,
    pub http: HttpSettings,
    pub flags: Flags,
    /// Back-off between retries of transient network failures (seconds).
    pub retry_delay_secs: u64,
}

// Raw shape of the config file; every field optional so the environment
// can carry the whole configuration.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    paths: RawPaths,
    #[serde(default)]
    rabbitmq: RawRabbit,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    flags: RawFlags,
    retry_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaths {
    input: Option<String>,
    output: Option<String>,
    work: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRabbit {
    broker: Option<String>,
    broker_port: Option<u16>,
    queue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHttp {
    bind: Option<String>,
    public_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFlags {
    #[serde(rename = "auto-delete")]
    auto_delete: Option<bool>,
}

impl Settings {
    /// Load settings from `config_path` (ignored when absent) overlaid with
    /// process environment variables.
    pub fn load(config_path: &Path) -> Result<Self, SettingsError> {
        Self::load_with_env(config_path, &|key| std::env::var(key).ok())
    }

    /// Load with an injectable environment lookup (tests).
    pub fn load_with_env(
        config_path: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let raw = if config_path.exists() {
            let text =
                std::fs::read_to_string(config_path).map_err(|e| SettingsError::Unreadable {
                    path: config_path.to_path_buf(),
                    message: e.to_string(),
                })?;
            serde_json::from_str::<RawConfig>(&text).map_err(|e| SettingsError::Invalid {
                path: config_path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            RawConfig::default()
        };

        let input = required(env("INPUT_PATH").or(raw.paths.input), Missing {
            key: "input path",
            config_key: "paths.input",
            env_var: "INPUT_PATH",
        })?;
        let output = required(env("OUTPUT_PATH").or(raw.paths.output), Missing {
            key: "output path",
            config_key: "paths.output",
            env_var: "OUTPUT_PATH",
        })?;
        let work = env("WORKDIR")
            .or(raw.paths.work)
            .unwrap_or_else(|| "work".to_string());
        let database = env("DATABASE_PATH")
            .or(raw.paths.database)
            .unwrap_or_else(|| "revid.db".to_string());

        let broker = required(env("RABBITMQ_BROKER").or(raw.rabbitmq.broker), Missing {
            key: "broker host",
            config_key: "rabbitmq.broker",
            env_var: "RABBITMQ_BROKER",
        })?;
        let queue = required(env("RABBITMQ_QUEUE").or(raw.rabbitmq.queue), Missing {
            key: "queue name",
            config_key: "rabbitmq.queue",
            env_var: "RABBITMQ_QUEUE",
        })?;
        let broker_port = match env("RABBITMQ_BROKER_PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| SettingsError::BadValue {
                env_var: "RABBITMQ_BROKER_PORT",
                value,
                message: e.to_string(),
            })?,
            None => raw.rabbitmq.broker_port.unwrap_or(5672),
        };

        let auto_delete = match env("AUTO_DELETE") {
            Some(value) => parse_bool(&value).ok_or_else(|| SettingsError::BadValue {
                env_var: "AUTO_DELETE",
                value: value.clone(),
                message: "expected true/false".to_string(),
            })?,
            None => raw.flags.auto_delete.unwrap_or(false),
        };

        let retry_delay_secs = match env("RETRY_DELAY_SECS") {
            Some(value) => value.parse::<u64>().map_err(|e| SettingsError::BadValue {
                env_var: "RETRY_DELAY_SECS",
                value,
                message: e.to_string(),
            })?,
            None => raw.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
        };

        let bind = env("BIND_ADDRESS")
            .or(raw.http.bind)
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let public_url = env("PUBLIC_URL")
            .or(raw.http.public_url)
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

        let settings = Settings {
            paths: PathSettings {
                input: absolute(&input),
                output: absolute(&output),
                work: absolute(&work),
                database: absolute(&database),
            },
            rabbitmq: RabbitSettings {
                broker,
                broker_port,
                queue,
            },
            http: HttpSettings {
                bind,
                public_url: public_url.trim_end_matches('/').to_string(),
            },
            flags: Flags { auto_delete },
            retry_delay_secs,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject path layouts that would let one component clobber another.
    fn validate(&self) -> Result<(), SettingsError> {
        if self.paths.input == self.paths.output {
            return Err(SettingsError::PathsEqual {
                path: self.paths.input.clone(),
            });
        }
        if self.paths.work.starts_with(&self.paths.input)
            || self.paths.input.starts_with(&self.paths.work)
        {
            return Err(SettingsError::WorkOverlapsInput {
                work: self.paths.work.clone(),
                input: self.paths.input.clone(),
            });
        }
        Ok(())
    }
}

// Small alias so the required() calls above stay readable.
use SettingsError::Missing;

fn required(value: Option<String>, missing: SettingsError) -> Result<String, SettingsError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
