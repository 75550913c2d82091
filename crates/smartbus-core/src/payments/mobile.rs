//! Dominican mobile payment.

use tracing::info;

use super::{parse_amount, PaymentError};
use crate::auth::{SessionManager, UserDirectory};
use crate::clock::Clock;
use crate::models::{Currency, FundingMethod, Transaction};
use crate::storage::KeyValueStore;
use crate::validation::is_valid_dominican_phone;

/// Mobile payment form, as typed by the rider.
#[derive(Debug, Clone, Default)]
pub struct MobilePayment {
    pub amount: String,
    pub full_name: String,
    pub phone: String,
}

impl MobilePayment {
    pub fn new(
        amount: impl Into<String>,
        full_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            amount: amount.into(),
            full_name: full_name.into(),
            phone: phone.into(),
        }
    }

    /// Check the form, returning the RD$ amount.
    pub fn validate(&self) -> Result<f64, PaymentError> {
        let amount = parse_amount(&self.amount)?;
        if self.full_name.trim().is_empty() {
            return Err(PaymentError::MissingName);
        }
        if self.phone.trim().is_empty() {
            return Err(PaymentError::MissingPhone);
        }
        if !is_valid_dominican_phone(&self.phone) {
            return Err(PaymentError::InvalidPhone(self.phone.clone()));
        }
        Ok(amount)
    }

    /// Validate and credit the rider's balance in RD$.
    pub fn pay<S, D, C>(
        &self,
        session: &mut SessionManager<S, D, C>,
    ) -> Result<Transaction, PaymentError>
    where
        S: KeyValueStore,
        D: UserDirectory,
        C: Clock,
    {
        let amount = self.validate()?;
        let transaction = session.add_transaction(amount, FundingMethod::Mobile, Currency::Dop)?;
        info!(amount, phone = %self.phone.trim(), "Mobile payment processed");
        Ok(transaction)
    }
}
