use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DB_ENV: &str = "MATERIAL_LEDGER_DB";
pub const LOG_ENV: &str = "MATERIAL_LEDGER_LOG";
pub const DEFAULT_DB_PATH: &str = "material_ledger.db";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through `lookup` so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup(DB_ENV) {
            Some(path) if path.trim().is_empty() => bail!("{DB_ENV} is set but empty"),
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_DB_PATH),
        };
        let log_filter = lookup(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self { db_path, log_filter })
    }

    /// Applies the command-line database override, if any.
    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn reads_environment_values() {
        let config =
            Config::from_lookup(lookup(&[(DB_ENV, "/tmp/stock.db"), (LOG_ENV, "debug")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/stock.db"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn empty_db_path_is_an_error() {
        assert!(Config::from_lookup(lookup(&[(DB_ENV, " ")])).is_err());
    }

    #[test]
    fn command_line_path_wins() {
        let config = Config::from_lookup(lookup(&[(DB_ENV, "env.db")]))
            .unwrap()
            .with_db_path(Some(PathBuf::from("flag.db")));
        assert_eq!(config.db_path, PathBuf::from("flag.db"));
    }
}
