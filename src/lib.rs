pub mod broker;
pub mod chain_table;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod relay;
pub mod types;
pub mod upstream;

pub use error::{RelayError, ResolveError, Result};
pub use chain_table::ChainUriTable;
pub use jsonrpc::{JsonRpcRequest, JsonRpcError};
pub use relay::{Consumption, Disposition, Relay};
pub use types::{
    ChainId, TxHash, InboundEnvelope, Request, OutboundEnvelope, LogLevel,
    MalformedPolicy, EthRpcErrorPolicy, RelayConfig
};

// Re-export commonly used items
pub use broker::{BrokerChannel, Delivery, AmqpBroker};
#[cfg(any(test, feature = "test-util"))]
pub use broker::MemoryBroker;
pub use config::{NormalizedConfig, resolve_config};
pub use upstream::{Resolve, Resolution, UpstreamResolver};
