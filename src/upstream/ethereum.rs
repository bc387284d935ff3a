use serde_json::Value;
use url::Url;

use crate::{
    error::ResolveError,
    jsonrpc::{JsonRpcError, JsonRpcRequest},
    types::EthRpcErrorPolicy,
};

use super::{read_verbatim, Resolution};

pub struct EthereumUpstream {
    client: reqwest::Client,
    url: Url,
    rpc_errors: EthRpcErrorPolicy,
}

impl EthereumUpstream {
    pub fn new(client: reqwest::Client, url: Url, rpc_errors: EthRpcErrorPolicy) -> Self {
        Self { client, url, rpc_errors }
    }

    /// `eth_getTransactionByHash` for `txn_id`. Any 2xx reply is the result,
    /// verbatim: the parsed JSON body, or the body text when it is not JSON.
    /// The `error` member is only inspected under [`EthRpcErrorPolicy::Reject`].
    pub async fn get_transaction(&self, txn_id: &str) -> Resolution {
        let request = JsonRpcRequest::get_transaction_by_hash(txn_id);
        let url = self.url.as_str();

        let response = match self.client.post(self.url.clone()).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "no response from ethereum");
                return Err(e.into());
            }
        };

        let body = read_verbatim(url, response).await.inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "no response from ethereum");
        })?;

        if self.rpc_errors == EthRpcErrorPolicy::Reject {
            if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
                if let Ok(rpc_error) = serde_json::from_value::<JsonRpcError>(error.clone()) {
                    tracing::warn!(code = rpc_error.code, message = %rpc_error.message, "ethereum returned rpc error");
                }
                return Err(ResolveError::JsonRpc {
                    url: url.to_string(),
                    error: error.clone(),
                });
            }
        }

        let hash = body.pointer("/result/hash").and_then(Value::as_str).unwrap_or("none");
        tracing::info!(
            txn_id = %txn_id,
            hash = %hash,
            "received response from ethereum"
        );
        Ok(body)
    }
}
