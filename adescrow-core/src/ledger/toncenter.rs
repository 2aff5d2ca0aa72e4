use super::{BroadcastAck, IncomingTransfer, LedgerClient, LedgerError, SignedTransfer};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const TESTNET_API_BASE: &str = "https://testnet.toncenter.com/api/v2/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// TonCenter v2 HTTP client.
#[derive(Clone)]
pub struct TonCenterClient {
    base: Url,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for TonCenterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonCenterClient")
            .field("base", &self.base.as_str())
            .field("api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Envelope of every TonCenter v2 response.
#[derive(Debug, Deserialize)]
struct TonResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    transaction_id: RawTransactionId,
    #[serde(default)]
    in_msg: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawTransactionId {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    value: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawGetMethodResult {
    #[serde(default)]
    stack: Vec<(String, serde_json::Value)>,
}

impl TonCenterClient {
    /// `base` is the API root, e.g. [`TESTNET_API_BASE`].
    pub fn new(base: Url, api_key: Option<String>) -> Self {
        // Keep the trailing slash so `join` appends instead of replacing the last segment.
        let base = if base.path().ends_with('/') {
            base
        } else {
            let mut base = base;
            let path = format!("{}/", base.path());
            base.set_path(&path);
            base
        };
        Self {
            base,
            api_key,
            http_client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn endpoint(&self, method: &str) -> Result<Url, LedgerError> {
        self.base
            .join(method)
            .map_err(|e| LedgerError::Configuration(format!("invalid ledger API URL: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    /// Send `request` and unwrap the TonCenter envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, LedgerError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::Http {
                status: status.as_u16(),
            });
        }

        let body: TonResponse<T> = if status.is_success() {
            response.json().await?
        } else {
            // Client errors still carry the `{ok: false, error}` envelope.
            let text = response.text().await?;
            let message = serde_json::from_str::<TonResponse<serde_json::Value>>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(text);
            return Err(LedgerError::Rejected {
                message: format!("{method}: HTTP {}: {message}", status.as_u16()),
            });
        };

        unwrap_envelope(method, body)
    }
}

impl TonCenterClient {
    async fn run_get_method(
        &self,
        address: &str,
        method: &str,
    ) -> Result<RawGetMethodResult, LedgerError> {
        let url = self.endpoint("runGetMethod")?;
        let request = self.http_client.post(url).json(&serde_json::json!({
            "address": address,
            "method": method,
            "stack": [],
        }));
        self.call("runGetMethod", request).await
    }
}

fn unwrap_envelope<T>(method: &str, body: TonResponse<T>) -> Result<T, LedgerError> {
    if !body.ok {
        return Err(LedgerError::Rejected {
            message: format!(
                "{method}: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        });
    }
    body.result
        .ok_or_else(|| LedgerError::Parse(format!("{method}: missing result")))
}

fn parse_transactions(raw: Vec<RawTransaction>) -> Result<Vec<IncomingTransfer>, LedgerError> {
    let mut transfers = Vec::with_capacity(raw.len());
    for tx in raw {
        let Some(in_msg) = tx.in_msg else {
            continue;
        };
        let value = if in_msg.value.is_empty() {
            0
        } else {
            in_msg
                .value
                .parse::<u64>()
                .map_err(|e| LedgerError::Parse(format!("invalid transfer value: {e}")))?
        };
        transfers.push(IncomingTransfer {
            value,
            memo: in_msg.message,
            tx_ref: tx.transaction_id.hash,
        });
    }
    Ok(transfers)
}

/// First stack entry as the hex digits of a `num`, `None` on an empty stack.
fn first_num(method: &str, result: RawGetMethodResult) -> Result<Option<String>, LedgerError> {
    let Some((kind, value)) = result.stack.into_iter().next() else {
        return Ok(None);
    };
    if kind != "num" {
        return Err(LedgerError::Parse(format!(
            "{method} stack entry has type {kind}, expected num"
        )));
    }
    let hex = value
        .as_str()
        .ok_or_else(|| LedgerError::Parse(format!("{method} stack value is not a string")))?;
    Ok(Some(hex.trim_start_matches("0x").to_string()))
}

/// Read the `seqno` get-method result. An empty stack means the wallet
/// contract is not deployed yet, whose sequence number is zero.
fn parse_seqno(result: RawGetMethodResult) -> Result<u32, LedgerError> {
    let Some(digits) = first_num("seqno", result)? else {
        return Ok(0);
    };
    u32::from_str_radix(&digits, 16)
        .map_err(|e| LedgerError::Parse(format!("invalid seqno 0x{digits}: {e}")))
}

/// Read the `get_public_key` result, a 256-bit unsigned integer.
fn parse_public_key(address: &str, result: RawGetMethodResult) -> Result<[u8; 32], LedgerError> {
    let Some(digits) = first_num("get_public_key", result)? else {
        return Err(LedgerError::Rejected {
            message: format!("wallet {address} returned no public key"),
        });
    };
    let invalid = || LedgerError::Parse(format!("invalid public key 0x{digits}"));
    if digits.len() > 64 || !digits.is_ascii() {
        return Err(invalid());
    }
    let padded = format!("{digits:0>64}");
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&padded[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(key)
}

#[async_trait]
impl LedgerClient for TonCenterClient {
    async fn list_incoming_transfers(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<IncomingTransfer>, LedgerError> {
        let url = self.endpoint("getTransactions")?;
        let limit = limit.to_string();
        let request = self.http_client.get(url).query(&[
            ("address", address),
            ("limit", limit.as_str()),
            ("archival", "true"),
        ]);
        let raw: Vec<RawTransaction> = self.call("getTransactions", request).await?;
        let transfers = parse_transactions(raw)?;
        debug!(address, count = transfers.len(), "Fetched incoming transfers");
        Ok(transfers)
    }

    async fn get_sequence_number(&self, address: &str) -> Result<u32, LedgerError> {
        parse_seqno(self.run_get_method(address, "seqno").await?)
    }

    async fn get_public_key(&self, address: &str) -> Result<[u8; 32], LedgerError> {
        let result = self.run_get_method(address, "get_public_key").await?;
        parse_public_key(address, result)
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<BroadcastAck, LedgerError> {
        let url = self.endpoint("sendBoc")?;
        let request = self
            .http_client
            .post(url)
            .json(&serde_json::json!({ "boc": transfer.boc }));
        match self.call::<serde_json::Value>("sendBoc", request).await {
            Ok(_) => Ok(BroadcastAck { accepted: true }),
            Err(LedgerError::Rejected { message }) => {
                error!(seqno = transfer.seqno, message, "Broadcast rejected by ledger");
                Ok(BroadcastAck { accepted: false })
            }
            Err(e) => Err(e),
        }
    }

    async fn is_reachable(&self) -> bool {
        let Ok(url) = self.endpoint("getMasterchainInfo") else {
            return false;
        };
        match self.authorize(self.http_client.get(url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Ledger health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transactions_skips_missing_inbound_message() {
        let body: TonResponse<Vec<RawTransaction>> = serde_json::from_str(
            r#"{
                "ok": true,
                "result": [
                    {"transaction_id": {"lt": "1", "hash": "h1"},
                     "in_msg": {"value": "2500000000", "message": "42", "source": "EQsrc"}},
                    {"transaction_id": {"lt": "2", "hash": "h2"}},
                    {"transaction_id": {"lt": "3", "hash": "h3"},
                     "in_msg": {"value": "", "message": ""}}
                ]
            }"#,
        )
        .unwrap();
        let transfers = parse_transactions(unwrap_envelope("getTransactions", body).unwrap()).unwrap();
        assert_eq!(
            transfers,
            vec![
                IncomingTransfer {
                    value: 2_500_000_000,
                    memo: "42".into(),
                    tx_ref: "h1".into(),
                },
                IncomingTransfer {
                    value: 0,
                    memo: String::new(),
                    tx_ref: "h3".into(),
                },
            ]
        );
    }

    #[test]
    fn test_not_ok_envelope_is_rejected() {
        let body: TonResponse<Vec<RawTransaction>> =
            serde_json::from_str(r#"{"ok": false, "error": "Incorrect address", "code": 416}"#)
                .unwrap();
        let err = unwrap_envelope("getTransactions", body).unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref message } if message.contains("Incorrect address")));
    }

    #[test]
    fn test_parse_seqno_reads_hex_stack() {
        let result: RawGetMethodResult =
            serde_json::from_str(r#"{"gas_used": 100, "stack": [["num", "0x1a"]], "exit_code": 0}"#)
                .unwrap();
        assert_eq!(parse_seqno(result).unwrap(), 26);

        let empty: RawGetMethodResult = serde_json::from_str(r#"{"stack": []}"#).unwrap();
        assert_eq!(parse_seqno(empty).unwrap(), 0);

        let wrong: RawGetMethodResult =
            serde_json::from_str(r#"{"stack": [["cell", {"bytes": ""}]]}"#).unwrap();
        assert!(matches!(parse_seqno(wrong), Err(LedgerError::Parse(_))));
    }

    #[test]
    fn test_parse_public_key_pads_to_256_bits() {
        let result: RawGetMethodResult = serde_json::from_str(
            r#"{"stack": [["num", "0x1f000000000000000000000000000000000000000000000000000000000066"]]}"#,
        )
        .unwrap();
        let key = parse_public_key("EQ", result).unwrap();
        assert_eq!(&key[..2], &[0x00, 0x1f]);
        assert_eq!(key[31], 0x66);

        let empty: RawGetMethodResult = serde_json::from_str(r#"{"stack": []}"#).unwrap();
        assert!(matches!(
            parse_public_key("EQ", empty),
            Err(LedgerError::Rejected { .. })
        ));
    }

    #[test]
    fn test_endpoint_keeps_api_prefix() {
        let client = TonCenterClient::new(
            Url::parse("https://testnet.toncenter.com/api/v2").unwrap(),
            None,
        );
        assert_eq!(
            client.endpoint("sendBoc").unwrap().as_str(),
            "https://testnet.toncenter.com/api/v2/sendBoc"
        );
    }
}
