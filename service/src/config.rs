use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;

const LISTEN_ADDR_VAR: &str = "ASSET_STORE_LISTEN_ADDR";
const DATABASE_URL_VAR: &str = "DATABASE_URL";
const MAX_CONNECTIONS_VAR: &str = "ASSET_STORE_MAX_CONNECTIONS";
const TRACE_STDOUT_VAR: &str = "ASSET_STORE_TRACE_STDOUT";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite://assets.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Settings supplied by the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub trace_stdout: bool,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let listen_addr: SocketAddr = parse_or(&lookup, LISTEN_ADDR_VAR, DEFAULT_LISTEN_ADDR.parse()?)?;
        let database_url =
            lookup(DATABASE_URL_VAR).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let max_connections = parse_or(&lookup, MAX_CONNECTIONS_VAR, DEFAULT_MAX_CONNECTIONS)?;
        let trace_stdout = parse_or(&lookup, TRACE_STDOUT_VAR, false)?;

        Ok(Config {
            listen_addr,
            database_url,
            max_connections,
            trace_stdout,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(!config.trace_stdout);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            (LISTEN_ADDR_VAR, "127.0.0.1:9000"),
            (DATABASE_URL_VAR, "sqlite::memory:"),
            (MAX_CONNECTIONS_VAR, "12"),
            (TRACE_STDOUT_VAR, "true"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 12);
        assert!(config.trace_stdout);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = config(&[(MAX_CONNECTIONS_VAR, "lots")]).unwrap_err();
        assert!(err.to_string().contains(MAX_CONNECTIONS_VAR));
    }
}
