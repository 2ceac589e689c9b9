//! # Outbound Records
//!
//! Bodies this client sends to the remote: transfer submissions, event
//! reports and trade records, plus the transfer settlement response.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A money-moving transfer submitted via `POST /send`.
///
/// The remote treats `tx_id` as the idempotency key: resubmitting the same
/// request after it settled returns the original settlement reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub tx_id: Uuid,
    pub to_address: String,
    /// Amount in the asset's smallest unit.
    pub satoshis: u64,
    pub currency_code: String,
    /// Fiat amount the customer paid for this transfer.
    pub fiat: Decimal,
}

impl TransferRequest {
    /// Create a transfer with a fresh idempotency key.
    pub fn new(
        to_address: impl Into<String>,
        satoshis: u64,
        currency_code: impl Into<String>,
        fiat: Decimal,
    ) -> Self {
        Self {
            tx_id: Uuid::new_v4(),
            to_address: to_address.into(),
            satoshis,
            currency_code: currency_code.into(),
            fiat,
        }
    }
}

/// Settlement response of `POST /send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    /// Settlement reference; absent if the remote accepted the call without
    /// settling.
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// Any further fields, kept for logging.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Operational event reported via `POST /event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub event_type: String,
    pub note: String,
    /// Local wall-clock time of the report, epoch milliseconds.
    pub device_time: i64,
}

impl EventReport {
    /// Stamp a new report with the current device time.
    pub fn new(event_type: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            note: note.into(),
            device_time: Utc::now().timestamp_millis(),
        }
    }
}

/// Trade record reported via `POST /trade`.
///
/// Trade fields are opaque to this client; `trade_id` lets the remote
/// discard duplicates when the record is resent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub trade_id: Uuid,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl TradeRecord {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            trade_id: Uuid::new_v4(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_serializes_camel_case() {
        let tx = TransferRequest::new("bc1qexample", 150_000, "EUR", Decimal::from(50));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["toAddress"], "bc1qexample");
        assert_eq!(json["satoshis"], 150_000);
        assert_eq!(json["currencyCode"], "EUR");
        assert_eq!(json["txId"], tx.tx_id.to_string());
    }

    #[test]
    fn transfers_get_distinct_ids() {
        let a = TransferRequest::new("a", 1, "EUR", Decimal::ONE);
        let b = TransferRequest::new("a", 1, "EUR", Decimal::ONE);
        assert_ne!(a.tx_id, b.tx_id);
    }

    #[test]
    fn transfer_result_keeps_extra_fields() {
        let body = serde_json::json!({"txHash": "abc", "fee": 120});
        let result: TransferResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.tx_hash.as_deref(), Some("abc"));
        assert_eq!(result.extra["fee"], 120);
    }

    #[test]
    fn transfer_result_without_hash() {
        let result: TransferResult = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(result.tx_hash.is_none());
    }

    #[test]
    fn event_report_wire_shape() {
        let report = EventReport::new("doorOpened", "service door");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["eventType"], "doorOpened");
        assert_eq!(json["note"], "service door");
        assert!(json["deviceTime"].as_i64().unwrap() > 0);
    }

    #[test]
    fn trade_record_flattens_fields() {
        let mut fields = serde_json::Map::new();
        fields.insert("fiat".into(), serde_json::json!(20));
        fields.insert("currency".into(), serde_json::json!("EUR"));
        let record = TradeRecord::new(fields);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fiat"], 20);
        assert_eq!(json["currency"], "EUR");
        assert!(json["tradeId"].is_string());
    }
}
