//! # Project configuration
//!
//! Loads the project-level `zyra.config` file and layers environment variables on top of it.
//!
//! ## Loading (block diagram)
//!
//! ```text
//! +-------------------+     +-------------------+     +-------------------+
//! | --config PATH     | --> | Path resolution   | --> | zyra.config file  |
//! | ZYRA_CONFIG env   |     | or <dir>/zyra.cfg |     |                   |
//! +-------------------+     +-------------------+     +-------------------+
//!                                                              |
//!                                                              v
//! +-------------------+     +-------------------+     +-------------------+
//! | .env + process    | --> | ZYRA_* prefix     | --> | Config            |
//! | environment       |     | lower-cased keys  |     | context/options/  |
//! +-------------------+     +-------------------+     | global assertions |
//!                                                     +-------------------+
//! ```
//!
//! ## Lookup
//!
//! 1. `--config PATH` given on the command line
//! 2. `ZYRA_CONFIG` environment variable
//! 3. `zyra.config` at the root of the directory being run
//!
//! When none of them applies the run uses an empty configuration.
//!
//! ## File layout
//!
//! ```text
//! [context]
//! token = secret
//!
//! [options]
//! base_url = https://api.example.com
//! timeout = 10000
//! concurrency = 8
//!
//! [assert]
//! res.status lt 500
//! ```

use indexmap::IndexMap;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::*;

use crate::{model::Assertion, parser, Error, Result};

/// Points at a config file outside the directory being run.
pub const ZYRA_CONFIG_ENV: &str = "ZYRA_CONFIG";

/// Environment variable holding the log filter of the CLI.
pub const ZYRA_LOG_ENV: &str = "ZYRA_LOG";

/// File name looked up at the root of a directory run.
pub const CONFIG_FILE_NAME: &str = "zyra.config";

const ENV_PREFIX: &str = "ZYRA_";

/// zyra's project configuration. Built once per run and shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Global variables available to every request file.
    pub context: IndexMap<String, String>,
    pub options: Options,
    /// Assertions evaluated against every response after the file's own assertions.
    pub assertions: Vec<Assertion>,
}

impl Config {
    /// Parse config text. `path` is only used for error reporting.
    pub fn parse(src: &str, path: &Path) -> Result<Config> {
        parser::parse_config(src).map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })
    }

    /// Load a config file from path.
    pub fn load_from(path: &Path) -> Result<Config> {
        let src = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Config::parse(&src, path)?;
        debug!("{} was successfully loaded: {cfg:#?}", path.display());
        Ok(cfg)
    }

    /// Find the config file for a run.
    ///
    /// Lookup order:
    /// 1. `explicit`, usually the `--config` flag
    /// 2. `ZYRA_CONFIG` environment variable
    /// 3. `zyra.config` inside `dir`
    pub fn locate(explicit: Option<&Path>, dir: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(value) = std::env::var(ZYRA_CONFIG_ENV) {
            let path = Path::new(&value);

            // `ZYRA_CONFIG=true` and the like are context values set under the wrong name
            if !looks_like_path(&value) {
                return Err(Error::Load(format!(
                    "{ZYRA_CONFIG_ENV} should be a path to a config file, not a config value. \
                     Got: {value:?}. Use ZYRA_<KEY>=value for context values instead."
                )));
            }
            if !path.exists() {
                return Err(Error::Load(format!(
                    "config file specified by {ZYRA_CONFIG_ENV} not found: {value:?}"
                )));
            }
            debug!("Loading config from {ZYRA_CONFIG_ENV}={value:?}");
            return Ok(Some(path.to_path_buf()));
        }

        Ok(dir
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file()))
    }

    /// Locate, parse and layer the environment over the run configuration.
    pub fn load(explicit: Option<&Path>, dir: Option<&Path>) -> Result<Config> {
        let _ = dotenv::dotenv();

        let mut cfg = match Config::locate(explicit, dir)? {
            Some(path) => Config::load_from(&path)?,
            None => {
                debug!("no config file found, using defaults");
                Config::default()
            }
        };
        cfg.load_env();
        Ok(cfg)
    }

    /// Add `ZYRA_<KEY>=value` environment variables to the context as `<key>`.
    ///
    /// Environment values override values from the config file. `ZYRA_CONFIG` and
    /// `ZYRA_LOG` are reserved and never become context variables.
    pub fn load_env(&mut self) {
        self.merge_env(std::env::vars());
        debug!("zyra context loaded from env: {:?}", self.context.keys());
    }

    fn merge_env(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if key == ZYRA_CONFIG_ENV || key == ZYRA_LOG_ENV {
                continue;
            }
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            self.context.insert(name.to_lowercase(), value);
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.options.get_str("base_url").ok().filter(|s| !s.is_empty())
    }

    /// Per-request transport timeout from the `timeout` option (milliseconds).
    pub fn timeout(&self) -> Result<Option<Duration>> {
        if !self.options.contains("timeout") {
            return Ok(None);
        }
        self.options.get_duration_ms("timeout").map(Some)
    }

    /// Max number of files in flight from the `concurrency` option.
    pub fn concurrency(&self) -> Result<Option<usize>> {
        if !self.options.contains("concurrency") {
            return Ok(None);
        }
        let n = self.options.get_int("concurrency")?;
        usize::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| Error::ValueError {
                key: "concurrency".into(),
                message: format!("expected a positive integer, got {n}"),
            })
    }
}

fn looks_like_path(value: &str) -> bool {
    let path = Path::new(value);
    path.extension().is_some_and(|ext| ext == "config")
        || value.contains(std::path::MAIN_SEPARATOR)
        || value.contains('/')
}

/// `[options]` of the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub(crate) values: IndexMap<String, String>,
}

impl Options {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn get_str(&self, key: impl AsRef<str>) -> Result<&str> {
        let key = key.as_ref();
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::ValueNotFound(key.to_string()))
    }

    pub fn get_int(&self, key: impl AsRef<str>) -> Result<i64> {
        let key = key.as_ref();
        self.get_str(key)?.parse().map_err(|e| Error::ValueError {
            key: key.to_string(),
            message: format!("{e}"),
        })
    }

    pub fn get_bool(&self, key: impl AsRef<str>) -> Result<bool> {
        let key = key.as_ref();
        self.get_str(key)?.parse().map_err(|e| Error::ValueError {
            key: key.to_string(),
            message: format!("{e}"),
        })
    }

    /// Duration given as whole milliseconds.
    pub fn get_duration_ms(&self, key: impl AsRef<str>) -> Result<Duration> {
        let key = key.as_ref();
        self.get_str(key)?
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| Error::ValueError {
                key: key.to_string(),
                message: format!("expected milliseconds: {e}"),
            })
    }
}
