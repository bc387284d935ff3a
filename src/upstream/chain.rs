use serde_json::Value;

use crate::{chain_table::ChainUriTable, error::ResolveError};

use super::{read_json, Resolution};

pub struct ChainUpstream {
    client: reqwest::Client,
    table: ChainUriTable,
}

impl ChainUpstream {
    pub fn new(client: reqwest::Client, table: ChainUriTable) -> Self {
        Self { client, table }
    }

    pub fn table(&self) -> &ChainUriTable {
        &self.table
    }

    /// `GET <base uri of chain><data>`.
    ///
    /// See [`body_result`] for how the reply body is read.
    pub async fn get(&self, chain: &str, data: &str) -> Resolution {
        let url = self.table.url_for(chain, data).inspect_err(|e| {
            tracing::warn!(chain = %chain, error = %e, "refusing lookup on unconfigured chain");
        })?;
        tracing::debug!(url = %url, "sending message to blockchain");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "no response from blockchain");
                return Err(e.into());
            }
        };

        let body = read_json(&url, response).await.inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "no response from blockchain");
        })?;

        body_result(body).inspect_err(|e| {
            tracing::info!(url = %url, error = %e, "received error response from blockchain");
        })
    }
}

/// Presence decides, never the value: a body carrying a `result` member
/// succeeds with it, `null`, `false` and `0` included. Without one, a present
/// `error.data` is the failure reason, and anything else is
/// [`ResolveError::Unknown`].
fn body_result(mut body: Value) -> Resolution {
    if let Some(result) = body.get_mut("result") {
        return Ok(result.take());
    }

    match body.pointer_mut("/error/data") {
        Some(data) => Err(ResolveError::Upstream(data.take())),
        None => Err(ResolveError::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_member_is_unwrapped() {
        let result = body_result(json!({"result": {"hash": "0xdef"}, "id": 3})).unwrap();
        assert_eq!(result, json!({"hash": "0xdef"}));
    }

    #[test]
    fn error_data_is_carried() {
        let err = body_result(json!({"error": {"code": -1, "data": "bad request"}})).unwrap_err();
        assert_eq!(err.reason(), json!("bad request"));
    }

    #[test]
    fn present_result_wins_whatever_its_value() {
        for value in [json!(null), json!(false), json!(0), json!("")] {
            let body = json!({"result": value.clone(), "error": {"data": "ignored"}});
            assert_eq!(body_result(body).unwrap(), value);
        }
    }

    #[test]
    fn null_error_data_is_still_the_reason() {
        let err = body_result(json!({"error": {"data": null}})).unwrap_err();
        assert_eq!(err.reason(), json!(null));
    }

    #[test]
    fn missing_result_and_error_data_is_unknown() {
        for body in [json!({}), json!({"error": {"message": "x"}}), json!([1, 2])] {
            let err = body_result(body).unwrap_err();
            assert_eq!(err.reason(), json!("Unknown error"));
        }
    }
}
