use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Correlation key threaded from the inbound request to its response. Echoed
/// back exactly as the producer sent it, whatever its JSON type.
pub type TxHash = Value;

/// Chain identifier used to pick a base URI from the [`crate::ChainUriTable`].
pub type ChainId = String;

/// `msgType` that routes a request to the Ethereum JSON-RPC endpoint.
pub const ETH_MSG_TYPE: &str = "eth";

/// `msgType` of every envelope that reports a failure.
pub const ERROR_MSG_TYPE: &str = "error";

/// A request envelope. Only `txHash` and `data` must be present; the inner
/// fields are read leniently, so scalars stand in for strings and a missing
/// `msgType` routes to the generic chain lookup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub tx_hash: TxHash,
    pub data: Request,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg_type: String,
    /// Only read for generic chain lookups, `eth` requests usually omit it.
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub uri: Option<ChainId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data: String,
}

fn coerce(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(coerce(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(coerce(Value::deserialize(deserializer)?))
}

impl Request {
    pub fn is_eth(&self) -> bool {
        self.msg_type == ETH_MSG_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub msg_type: String,
    pub tx_hash: TxHash,
    pub data: Value,
}

impl OutboundEnvelope {
    pub fn success(msg_type: impl Into<String>, tx_hash: impl Into<TxHash>, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            tx_hash: tx_hash.into(),
            data,
        }
    }

    pub fn error(tx_hash: impl Into<TxHash>, reason: Value) -> Self {
        Self {
            msg_type: ERROR_MSG_TYPE.to_string(),
            tx_hash: tx_hash.into(),
            data: reason,
        }
    }

    pub fn is_error(&self) -> bool {
        self.msg_type == ERROR_MSG_TYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// What to do with a delivery whose body is not a valid [`InboundEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Acknowledge and forget the delivery.
    Drop,
    /// Reject without requeue so the queue's dead-letter exchange picks it up.
    DeadLetter,
}

/// How an Ethereum reply carrying a JSON-RPC `error` member is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EthRpcErrorPolicy {
    /// Any 2xx reply is republished as a result.
    Passthrough,
    /// A reply with an `error` member is republished as an error envelope.
    Reject,
}

// raw settings as read from the environment, see config::resolve_config

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    pub broker_uri: String,
    pub queue: String,
    pub chain_uris: Vec<(ChainId, String)>,
    pub ethereum_api: String,
    pub poll_interval_ms: u64,
    pub prefetch: u16,
    pub log_level: LogLevel,
    pub malformed_policy: MalformedPolicy,
    pub eth_rpc_errors: EthRpcErrorPolicy,
    pub http_timeout_ms: Option<u64>,
}

pub const KNOWN_CHAINS: [&str; 3] = ["SYNC", "COMMIT", "VALIDATE"];

impl RelayConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            broker_uri: "amqp://127.0.0.1:5672/%2f".to_string(),
            queue: queue.into(),
            chain_uris: KNOWN_CHAINS
                .iter()
                .map(|id| (id.to_string(), String::new()))
                .collect(),
            ethereum_api: "https://mainnet.infura.io/".to_string(),
            poll_interval_ms: 3000,
            prefetch: 50,
            log_level: LogLevel::Info,
            malformed_policy: MalformedPolicy::Drop,
            eth_rpc_errors: EthRpcErrorPolicy::Passthrough,
            http_timeout_ms: None,
        }
    }

    pub fn with_chain_uri(mut self, chain: &str, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        match self.chain_uris.iter_mut().find(|(id, _)| id == chain) {
            Some(entry) => entry.1 = uri,
            None => self.chain_uris.push((chain.to_string(), uri)),
        }
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new("pds")
    }
}
