//! Upstream lookups: one HTTP call per request, outcome normalized into a
//! JSON result or a [`ResolveError`].

pub mod chain;
pub mod ethereum;

use async_trait::async_trait;
use serde_json::Value;

use crate::{config::UpstreamConfig, error::ResolveError, Request, Result};

pub use chain::ChainUpstream;
pub use ethereum::EthereumUpstream;

pub type Resolution = std::result::Result<Value, ResolveError>;

/// The single seam between the relay loop and the upstreams.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, request: &Request) -> Resolution;
}

/// Routes `eth` requests to the Ethereum endpoint and everything else to the
/// chain named by `request.uri`.
pub struct UpstreamResolver {
    ethereum: EthereumUpstream,
    chains: ChainUpstream,
}

impl UpstreamResolver {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            ethereum: EthereumUpstream::new(client.clone(), config.ethereum_api, config.eth_rpc_errors),
            chains: ChainUpstream::new(client, config.chains),
        })
    }
}

#[async_trait]
impl Resolve for UpstreamResolver {
    async fn resolve(&self, request: &Request) -> Resolution {
        tracing::debug!(msg_type = %request.msg_type, "resolving request");

        if request.is_eth() {
            self.ethereum.get_transaction(&request.data).await
        } else {
            let chain = request.uri.as_deref().unwrap_or_default();
            self.chains.get(chain, &request.data).await
        }
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> std::result::Result<(), ResolveError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ResolveError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Reads a response body as JSON, mapping non-2xx statuses and unparseable
/// bodies to transport-level failures.
pub(crate) async fn read_json(url: &str, response: reqwest::Response) -> Resolution {
    check_status(url, &response)?;

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ResolveError::MalformedBody {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a 2xx body as-is: JSON when it parses, otherwise the body text as a
/// JSON string (empty for an empty body).
pub(crate) async fn read_verbatim(url: &str, response: reqwest::Response) -> Resolution {
    check_status(url, &response)?;

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
}
