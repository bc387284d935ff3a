use std::str::FromStr;

use crate::{
    error::{RelayError, Result},
    types::{RelayConfig, KNOWN_CHAINS},
};

/// Prefix of the per-chain URI keys, e.g. `BLOCKCHAIN_URI_SYNC`.
pub const CHAIN_URI_PREFIX: &str = "BLOCKCHAIN_URI_";

impl RelayConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to [`RelayConfig::new`]
    /// defaults for every key that is missing or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = RelayConfig::new(get("RELAY_QUEUE").unwrap_or_else(|| "pds".to_string()));

        if let Some(uri) = get("RABBITMQ_URI").or_else(|| get("RABITMQ_URI")) {
            config.broker_uri = uri;
        }
        for chain in KNOWN_CHAINS {
            if let Some(uri) = get(&format!("{CHAIN_URI_PREFIX}{chain}")) {
                config = config.with_chain_uri(chain, uri);
            }
        }
        if let Some(api) = get("ETHEREUM_API") {
            config.ethereum_api = api;
        }
        if let Some(ms) = get("POLL_TIMER").or_else(|| get("pollTimer")) {
            config.poll_interval_ms = parse("POLL_TIMER", &ms)?;
        }
        if let Some(prefetch) = get("PREFETCH") {
            config.prefetch = parse("PREFETCH", &prefetch)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = parse_enum("LOG_LEVEL", &level)?;
        }
        if let Some(policy) = get("MALFORMED_POLICY") {
            config.malformed_policy = parse_enum("MALFORMED_POLICY", &policy)?;
        }
        if let Some(policy) = get("ETH_RPC_ERRORS") {
            config.eth_rpc_errors = parse_enum("ETH_RPC_ERRORS", &policy)?;
        }
        if let Some(ms) = get("HTTP_TIMEOUT_MS") {
            config.http_timeout_ms = Some(parse("HTTP_TIMEOUT_MS", &ms)?);
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| RelayError::Config {
        key: key.to_string(),
        reason: format!("{raw:?}: {e}"),
    })
}

// enums share their serde spelling with the environment values
fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase())).map_err(|e| {
        RelayError::Config {
            key: key.to_string(),
            reason: format!("{raw:?}: {e}"),
        }
    })
}

