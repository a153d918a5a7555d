use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Torrent files to verify pieces against.
    pub torrents: Vec<PathBuf>,
    /// Log to this file instead of stdout.
    pub log_file: Option<PathBuf>,
    /// One of trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            torrents: Vec::new(),
            log_file: None,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// `config.toml` in the user's configuration folder.
    ///
    /// # Errors
    ///
    /// If the user does not have a home folder.
    pub fn default_path() -> Result<PathBuf, Error> {
        let dotfile = ProjectDirs::from("", "", "wiretrace")
            .ok_or(Error::HomeInvalid)?;
        Ok(dotfile.config_dir().join("config.toml"))
    }

    /// Load the configuration file at `path`, or at [`Config::default_path`].
    ///
    /// A missing file at the default location gives the default
    /// configuration, a missing file that was asked for is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        let config_str = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::ConfigError(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };

        Self::from_toml(&config_str)
    }

    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config = toml::from_str::<Config>(s)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        config.level()?;
        Ok(config)
    }

    pub fn level(&self) -> Result<Level, Error> {
        Level::from_str(&self.log_level).map_err(|_| {
            Error::ConfigError(format!(
                "invalid log_level `{}`",
                self.log_level
            ))
        })
    }
}
