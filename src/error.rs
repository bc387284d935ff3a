use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Cannot connect to broker: {0}")]
    Connect(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<lapin::Error> for RelayError {
    fn from(err: lapin::Error) -> Self {
        RelayError::Broker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Why an upstream lookup did not produce a result.
///
/// Every variant ends up as the `data` of an error envelope on the response
/// queue, see [`ResolveError::reason`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status code {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response body from {url}: {reason}")]
    MalformedBody { url: String, reason: String },

    /// The upstream answered but reported an error payload instead of a result.
    #[error("Upstream error: {0}")]
    Upstream(Value),

    #[error("Unknown error")]
    Unknown,

    #[error("Unknown chain identifier: {0}")]
    UnknownChain(String),

    #[error("JSON-RPC error from {url}")]
    JsonRpc { url: String, error: Value },
}

impl ResolveError {
    /// JSON published as the error envelope payload.
    pub fn reason(&self) -> Value {
        match self {
            ResolveError::Upstream(data) => data.clone(),
            ResolveError::JsonRpc { error, .. } => error.clone(),
            other => Value::String(other.to_string()),
        }
    }
}
