//! # Market Snapshot
//!
//! The exchange rate, fiat balance, locale and limits returned by
//! `GET /poll`. A snapshot is only ever replaced as a whole: a successful
//! poll swaps in a new value, a failed poll leaves the previous one intact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market and account state reported by the remote on each poll.
///
/// Field names on the wire follow the remote's poll response:
/// `{rate, fiat, locale, txLimit, idVerificationLimit?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Units of fiat per unit of the traded asset.
    #[serde(rename = "rate")]
    pub exchange_rate: Decimal,
    /// Fiat balance available to this client.
    #[serde(rename = "fiat")]
    pub fiat_balance: Decimal,
    /// Locale and currency presentation data, passed through untouched.
    #[serde(default)]
    pub locale: serde_json::Value,
    /// Per-transaction fiat limit.
    #[serde(rename = "txLimit", default)]
    pub transaction_limit: Option<Decimal>,
    /// Fiat amount above which identity verification is required.
    #[serde(
        rename = "idVerificationLimit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id_verification_limit: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn deserializes_poll_body_with_numbers() {
        let body = serde_json::json!({
            "rate": 43250.5,
            "fiat": 1200,
            "locale": {"currency": "EUR", "localeInfo": {"primaryLocale": "de-DE"}},
            "txLimit": 500,
            "idVerificationLimit": 1000
        });
        let snapshot: MarketSnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snapshot.exchange_rate, Decimal::from_str("43250.5").unwrap());
        assert_eq!(snapshot.fiat_balance, Decimal::from(1200));
        assert_eq!(snapshot.locale["currency"], "EUR");
        assert_eq!(snapshot.transaction_limit, Some(Decimal::from(500)));
        assert_eq!(snapshot.id_verification_limit, Some(Decimal::from(1000)));
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let body = serde_json::json!({"rate": "1.5", "fiat": "10"});
        let snapshot: MarketSnapshot = serde_json::from_value(body).unwrap();
        assert!(snapshot.locale.is_null());
        assert_eq!(snapshot.transaction_limit, None);
        assert_eq!(snapshot.id_verification_limit, None);
    }

    #[test]
    fn missing_rate_is_rejected() {
        let body = serde_json::json!({"fiat": 10});
        assert!(serde_json::from_value::<MarketSnapshot>(body).is_err());
    }
}
