use std::time::Duration;
use url::Url;

use crate::{
    chain_table::ChainUriTable,
    error::{RelayError, Result},
    types::{EthRpcErrorPolicy, LogLevel, MalformedPolicy, RelayConfig},
};

pub const EXCHANGE: &str = "pds.ex";
pub const RESPONSE_QUEUE: &str = "pds.res";

#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    pub broker: BrokerConfig,
    pub upstream: UpstreamConfig,
    /// Wait before subscribing again after the broker cancelled the consumer
    pub poll_interval: Duration,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// AMQP connection URI
    pub uri: String,
    /// Durable queue the worker consumes from
    pub queue: String,
    /// Direct exchange the queue is bound to
    pub exchange: String,
    /// Queue the response envelopes are published to
    pub response_queue: String,
    /// Ceiling on unacknowledged deliveries held by the consumer
    pub prefetch: u16,
    pub malformed_policy: MalformedPolicy,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub chains: ChainUriTable,
    /// Ethereum JSON-RPC endpoint
    pub ethereum_api: Url,
    pub eth_rpc_errors: EthRpcErrorPolicy,
    /// Whole-request timeout, `None` keeps the HTTP client default
    pub timeout: Option<Duration>,
}

pub fn resolve_config(config: RelayConfig) -> Result<NormalizedConfig> {
    if config.queue.is_empty() {
        return Err(invalid("RELAY_QUEUE", "queue name must not be empty"));
    }
    if config.prefetch == 0 {
        return Err(invalid("PREFETCH", "prefetch must be at least 1"));
    }

    let broker_uri = Url::parse(&config.broker_uri)
        .map_err(|e| invalid("RABBITMQ_URI", &e.to_string()))?;
    if !matches!(broker_uri.scheme(), "amqp" | "amqps") {
        return Err(invalid("RABBITMQ_URI", "scheme must be amqp or amqps"));
    }

    for (chain, uri) in config.chain_uris.iter().filter(|(_, uri)| !uri.is_empty()) {
        Url::parse(uri).map_err(|e| invalid(&format!("BLOCKCHAIN_URI_{chain}"), &e.to_string()))?;
    }

    let ethereum_api = Url::parse(&config.ethereum_api)
        .map_err(|e| invalid("ETHEREUM_API", &e.to_string()))?;

    Ok(NormalizedConfig {
        broker: BrokerConfig {
            uri: config.broker_uri,
            queue: config.queue,
            exchange: EXCHANGE.to_string(),
            response_queue: RESPONSE_QUEUE.to_string(),
            prefetch: config.prefetch,
            malformed_policy: config.malformed_policy,
        },
        upstream: UpstreamConfig {
            chains: ChainUriTable::new(config.chain_uris),
            ethereum_api,
            eth_rpc_errors: config.eth_rpc_errors,
            timeout: config.http_timeout_ms.map(Duration::from_millis),
        },
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        log_level: config.log_level,
    })
}

fn invalid(key: &str, reason: &str) -> RelayError {
    RelayError::Config {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
