use serde::{Deserialize,Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const GET_TRANSACTION_BY_HASH: &str = "eth_getTransactionByHash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: 1,
        }
    }

    pub fn get_transaction_by_hash(txn_id: &str) -> Self {
        Self::new(GET_TRANSACTION_BY_HASH, json!([txn_id]))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_lookup_request_shape() {
        let req = JsonRpcRequest::get_transaction_by_hash("0xTXN");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "method": "eth_getTransactionByHash",
                "params": ["0xTXN"],
                "id": 1
            })
        );
    }
}
