pub mod from_env;
pub mod resolve_config;

pub use resolve_config::{resolve_config, BrokerConfig, NormalizedConfig, UpstreamConfig};
