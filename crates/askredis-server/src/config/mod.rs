pub mod directives;
pub mod settings;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use directives::{Block, Directive};
pub use settings::{MembershipSettings, PermissionSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: invalid value {value:?} for '{directive}'")]
    InvalidValue {
        directive: String,
        value: String,
        line: usize,
    },

    #[error("invalid redis address {0:?}")]
    InvalidAddress(String),

    #[error("empty key")]
    EmptyKey,

    #[error("empty prefix")]
    EmptyPrefix,

    #[error("line {line}: unknown permission module '{name}'")]
    UnknownModule { name: String, line: usize },

    #[error("no modules configured; add an 'ask_redis' or 'permission redis' block")]
    NoModules,

    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse json config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which modules to run and how each one reaches Redis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ask_redis: Option<MembershipSettings>,
    pub permission: Option<PermissionSettings>,
}

impl Config {
    /// Parse directive text. Blocks for other modules are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();
        for block in directives::parse(text)? {
            match block.name.as_str() {
                "ask_redis" => {
                    cfg.ask_redis = Some(MembershipSettings::from_directives(&block.directives)?);
                }
                "permission" => match block.args.first().map(String::as_str) {
                    Some("redis") => {
                        cfg.permission =
                            Some(PermissionSettings::from_directives(&block.directives)?);
                    }
                    other => {
                        return Err(ConfigError::UnknownModule {
                            name: other.unwrap_or_default().to_owned(),
                            line: block.line,
                        })
                    }
                },
                other => warn!(block = other, line = block.line, "ignoring unknown config block"),
            }
        }
        Ok(cfg)
    }

    /// Load from disk. `.json` files are deserialized directly; anything else
    /// is treated as directive text.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::parse(&text)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ask_redis.is_none() && self.permission.is_none() {
            return Err(ConfigError::NoModules);
        }
        if let Some(s) = &self.ask_redis {
            s.validate()?;
        }
        if let Some(s) = &self.permission {
            s.validate()?;
        }
        Ok(())
    }
}
