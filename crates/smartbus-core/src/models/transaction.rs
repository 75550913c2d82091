use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a top-up was funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum FundingMethod {
    Mobile,
    Paypal,
}

impl FundingMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            FundingMethod::Mobile => "Mobile Payment RD",
            FundingMethod::Paypal => "PayPal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Currency {
    #[serde(rename = "RD$")]
    Dop,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Dop => "RD$",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

/// A balance top-up. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub method: FundingMethod,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Build a completed transaction. There is no payment backend, so
    /// every recorded top-up is terminal.
    pub fn completed(
        id: String,
        amount: f64,
        method: FundingMethod,
        currency: Currency,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount,
            method,
            currency,
            date,
            status: TransactionStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_wire_names() {
        let tx = Transaction::completed(
            "1700000000000".to_string(),
            50.0,
            FundingMethod::Mobile,
            Currency::Dop,
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        );
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["method"], "mobile");
        assert_eq!(value["currency"], "RD$");
        assert_eq!(value["status"], "completed");

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }
}
