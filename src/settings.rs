// bitwig-mcp
// Copyright (C) 2024  The bitwig-mcp authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Bridge configuration.
//!
//! Settings come from defaults, a JSON file, or `BITWIG_MCP_*` environment variables. They are
//! loaded once and passed to [`Controller::new`](crate::controller::Controller::new); nothing
//! reads them from global state.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, fs, io, path::Path, str::FromStr};
use thiserror::Error;

/// Prefix of the environment variables read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "BITWIG_MCP_";

const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// A specialized [`Result`](std::result::Result) type for loading settings.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read settings file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse settings: {0}")]
    Parse(serde_json::Error),
    #[error("invalid setting {field} = {value:?}: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub log_level: String,
    /// Host running Bitwig Studio.
    pub bitwig_host: String,
    /// Port Bitwig listens on for OSC messages.
    pub bitwig_send_port: u16,
    /// Port the bridge listens on for messages from Bitwig.
    pub bitwig_receive_port: u16,
    /// Port of the MCP server's HTTP transport.
    pub mcp_port: u16,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            app_name: "bitwig-mcp-server".to_owned(),
            log_level: "INFO".to_owned(),
            bitwig_host: "127.0.0.1".to_owned(),
            bitwig_send_port: 8000,
            bitwig_receive_port: 9000,
            mcp_port: 8080,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment on top of the defaults.
    ///
    /// Variable names are matched case-insensitively, e.g. `BITWIG_MCP_BITWIG_HOST`.
    pub fn from_env() -> Result<Settings> {
        let vars: HashMap<String, String> = env::vars()
            .map(|(key, value)| (key.to_uppercase(), value))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    /// Reads settings through `lookup`, which receives upper-case variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: &str| lookup(&format!("{}{}", ENV_PREFIX, field.to_uppercase()));
        let mut settings = Settings::default();
        if let Some(value) = var("app_name") {
            settings.app_name = value;
        }
        if let Some(value) = var("log_level") {
            settings.log_level = value;
        }
        if let Some(value) = var("bitwig_host") {
            settings.bitwig_host = value;
        }
        if let Some(value) = var("bitwig_send_port") {
            settings.bitwig_send_port = parse("bitwig_send_port", &value)?;
        }
        if let Some(value) = var("bitwig_receive_port") {
            settings.bitwig_receive_port = parse("bitwig_receive_port", &value)?;
        }
        if let Some(value) = var("mcp_port") {
            settings.mcp_port = parse("mcp_port", &value)?;
        }
        settings.validate()
    }

    /// Reads settings from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&json).map_err(Error::Parse)?;
        settings.validate()
    }

    /// Normalizes the log level to upper case and rejects blank names or unknown levels.
    pub fn validate(mut self) -> Result<Settings> {
        let level = self.log_level.to_uppercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::Invalid {
                field: "log_level",
                value: self.log_level,
                reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
            });
        }
        self.log_level = level;

        if self.app_name.trim().is_empty() {
            return Err(Error::Invalid {
                field: "app_name",
                value: self.app_name,
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(self)
    }

    /// The `host:port` Bitwig listens on.
    pub fn send_address(&self) -> String {
        format!("{}:{}", self.bitwig_host, self.bitwig_send_port)
    }

    /// The `host:port` the bridge listens on.
    pub fn receive_address(&self) -> String {
        format!("{}:{}", self.bitwig_host, self.bitwig_receive_port)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => log::LevelFilter::Debug,
            "WARNING" => log::LevelFilter::Warn,
            "ERROR" | "CRITICAL" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        }
    }

    /// Raises or lowers the global `log` level to match these settings.
    pub fn apply_log_level(&self) {
        log::set_max_level(self.level_filter());
        log::info!("Logging configured with level {}", self.log_level);
    }
}

fn parse<T: FromStr>(field: &'static str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| Error::Invalid {
        field,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}
