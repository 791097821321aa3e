//! JSON-RPC gateway for XRPL-family ledger nodes (rippled / xahaud).
//!
//! Uses the `account_info`, `submit`, and `tx` methods over HTTP. Response
//! decoding is split into pure parse functions so the wire mapping is
//! testable without a node.

use async_trait::async_trait;
use serde_json::{json, Value};

use tidewater_core::{AccountId, Drops, TxRef};

use crate::error::GatewayError;
use crate::traits::LedgerGateway;
use crate::types::{PaymentTx, TxStatus};

/// `LedgerGateway` over a ledger node's JSON-RPC endpoint.
pub struct JsonRpcGateway {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonRpcGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({ "method": method, "params": [params] });
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let doc: Value = response.json().await?;
        doc.get("result")
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse("missing result object".into()))
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn balance(&self, account: &AccountId) -> Result<Drops, GatewayError> {
        let result = self
            .call(
                "account_info",
                json!({
                    "account": account.as_str(),
                    "ledger_index": "validated",
                }),
            )
            .await?;
        parse_balance(&result, account)
    }

    async fn submit(&self, tx: &PaymentTx) -> Result<TxRef, GatewayError> {
        let blob = tx.signed_blob.as_ref().ok_or_else(|| {
            GatewayError::Submit("unsigned transaction: signing is the wallet's concern".into())
        })?;
        let result = self.call("submit", json!({ "tx_blob": blob })).await?;
        let tx_ref = parse_submit(&result)?;
        tracing::info!(tx_ref = %tx_ref, amount = %tx.amount, "transaction submitted");
        Ok(tx_ref)
    }

    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus, GatewayError> {
        let result = self
            .call("tx", json!({ "transaction": tx_ref.as_str() }))
            .await?;
        parse_tx_status(&result)
    }
}

fn rpc_error(result: &Value) -> Option<&str> {
    result.get("error").and_then(Value::as_str)
}

/// Decode an `account_info` result into a drops balance.
fn parse_balance(result: &Value, account: &AccountId) -> Result<Drops, GatewayError> {
    match rpc_error(result) {
        Some("actNotFound") => return Err(GatewayError::AccountNotFound(account.to_string())),
        Some(error) => return Err(GatewayError::Rpc(error.to_string())),
        None => {}
    }
    let balance = result
        .pointer("/account_data/Balance")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("missing account_data.Balance".into()))?;
    balance
        .parse::<u64>()
        .map(Drops)
        .map_err(|_| GatewayError::InvalidResponse(format!("unparseable balance: {}", balance)))
}

/// Decode a `submit` result into a transaction reference.
///
/// `tes`/`ter` engine results mean the transaction was accepted for a
/// ledger; anything else is a definitive submission rejection.
fn parse_submit(result: &Value) -> Result<TxRef, GatewayError> {
    if let Some(error) = rpc_error(result) {
        return Err(GatewayError::Rpc(error.to_string()));
    }
    let code = result
        .get("engine_result")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("missing engine_result".into()))?;
    if !(code.starts_with("tes") || code.starts_with("ter")) {
        return Err(GatewayError::Submit(code.to_string()));
    }
    result
        .pointer("/tx_json/hash")
        .and_then(Value::as_str)
        .map(TxRef::new)
        .ok_or_else(|| GatewayError::InvalidResponse("missing tx_json.hash".into()))
}

/// Decode a `tx` result into a transaction status.
fn parse_tx_status(result: &Value) -> Result<TxStatus, GatewayError> {
    match rpc_error(result) {
        Some("txnNotFound") => return Ok(TxStatus::NotFound),
        Some(error) => return Err(GatewayError::Rpc(error.to_string())),
        None => {}
    }
    if !result
        .get("validated")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(TxStatus::Pending);
    }
    let code = result
        .pointer("/meta/TransactionResult")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("missing meta.TransactionResult".into()))?;
    if code == "tesSUCCESS" {
        Ok(TxStatus::Success {
            code: code.to_string(),
        })
    } else {
        Ok(TxStatus::Failed {
            code: code.to_string(),
        })
    }
}
