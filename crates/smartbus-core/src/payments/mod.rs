//! Balance top-ups.
//!
//! Two funding methods, both simulated:
//! - `MobilePayment`: Dominican mobile payment in RD$
//! - `PayPalWallets`: demo PayPal accounts debited in USD
//!
//! Either way the rider's balance is credited in RD$ through
//! `SessionManager::add_transaction`.

pub mod error;
pub mod mobile;
pub mod paypal;

pub use error::PaymentError;
pub use mobile::MobilePayment;
pub use paypal::{PayPalAccount, PayPalReceipt, PayPalRegistration, PayPalWallets};

/// US dollars per Dominican peso.
pub const USD_PER_DOP: f64 = 0.017;

/// USD equivalent of an RD$ amount, rounded to cents.
pub fn usd_equivalent(rd_amount: f64) -> f64 {
    (rd_amount * USD_PER_DOP * 100.0).round() / 100.0
}

/// Parse a typed amount. Must be a finite number greater than zero.
pub fn parse_amount(input: &str) -> Result<f64, PaymentError> {
    match input.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(PaymentError::InvalidAmount(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_equivalent_rounds_to_cents() {
        assert_eq!(usd_equivalent(500.0), 8.5);
        assert_eq!(usd_equivalent(1000.0), 17.0);
        assert_eq!(usd_equivalent(123.0), 2.09);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 250.5 ").unwrap(), 250.5);
        for bad in ["", "abc", "0", "-10", "NaN", "inf"] {
            assert!(
                matches!(parse_amount(bad), Err(PaymentError::InvalidAmount(_))),
                "{bad} should be rejected"
            );
        }
    }
}
