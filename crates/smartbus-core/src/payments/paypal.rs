//! Simulated PayPal wallets.
//!
//! No PayPal API is involved. Accounts live in memory, seeded with the demo
//! accounts; a payment debits the USD equivalent from the wallet and
//! credits the RD$ amount to the rider.

use std::sync::RwLock;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{parse_amount, usd_equivalent, PaymentError};
use crate::auth::{SessionError, SessionManager, UserDirectory};
use crate::clock::Clock;
use crate::models::{Currency, FundingMethod, Transaction};
use crate::storage::KeyValueStore;
use crate::validation::is_valid_email;

/// Starting balance of every demo and newly registered wallet, in USD.
pub const STARTING_BALANCE_USD: f64 = 1000.0;

const MIN_SIGN_IN_PASSWORD: usize = 4;
const MIN_NEW_PASSWORD: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayPalAccount {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    /// USD.
    pub balance: f64,
}

impl PayPalAccount {
    pub fn new(email: &str, password: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            balance: STARTING_BALANCE_USD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayPalRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Result of a completed PayPal payment.
#[derive(Debug, Clone)]
pub struct PayPalReceipt {
    pub usd_charged: f64,
    pub remaining_usd: f64,
    pub transaction: Transaction,
}

#[derive(Debug, Default)]
pub struct PayPalWallets {
    accounts: RwLock<Vec<PayPalAccount>>,
}

impl PayPalWallets {
    pub fn new(accounts: Vec<PayPalAccount>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    pub fn with_demo_accounts() -> Self {
        Self::new(vec![
            PayPalAccount::new("usuario@paypal.com", "1234", "Usuario Demo"),
            PayPalAccount::new("test@gmail.com", "test", "Test User"),
            PayPalAccount::new("demo@hotmail.com", "demo", "Demo User"),
        ])
    }

    fn find(&self, email: &str) -> Option<PayPalAccount> {
        let email = email.trim();
        let accounts = self.accounts.read().ok()?;
        accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn account(&self, email: &str) -> Option<PayPalAccount> {
        self.find(email)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<PayPalAccount, PaymentError> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(PaymentError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(PaymentError::InvalidEmail);
        }
        if password.chars().count() < MIN_SIGN_IN_PASSWORD {
            return Err(PaymentError::PasswordTooShort {
                min: MIN_SIGN_IN_PASSWORD,
            });
        }

        match self.find(email) {
            Some(account) if account.password == password => {
                info!(email = %account.email, "PayPal sign-in");
                Ok(account)
            }
            _ => {
                debug!(email = %email, "PayPal sign-in rejected");
                Err(PaymentError::InvalidCredentials)
            }
        }
    }

    pub fn register(&self, registration: PayPalRegistration) -> Result<PayPalAccount, PaymentError> {
        let email = registration.email.trim();
        if registration.name.trim().is_empty()
            || email.is_empty()
            || registration.password.trim().is_empty()
            || registration.confirm_password.trim().is_empty()
        {
            return Err(PaymentError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(PaymentError::InvalidEmail);
        }
        if registration.password.chars().count() < MIN_NEW_PASSWORD {
            return Err(PaymentError::PasswordTooShort {
                min: MIN_NEW_PASSWORD,
            });
        }
        if registration.password != registration.confirm_password {
            return Err(PaymentError::PasswordMismatch);
        }
        if self.find(email).is_some() {
            return Err(PaymentError::EmailTaken(email.to_string()));
        }

        let account = PayPalAccount::new(email, &registration.password, registration.name.trim());
        self.accounts
            .write()
            .map_err(|_| PaymentError::WalletUnavailable)?
            .push(account.clone());
        info!(email = %account.email, "PayPal account registered");
        Ok(account)
    }

    /// Replace an account's password after the recovery step.
    pub fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), PaymentError> {
        if new_password.trim().is_empty() || confirm_password.trim().is_empty() {
            return Err(PaymentError::MissingFields);
        }
        if new_password != confirm_password {
            return Err(PaymentError::PasswordMismatch);
        }
        if new_password.chars().count() < MIN_NEW_PASSWORD {
            return Err(PaymentError::PasswordTooShort {
                min: MIN_NEW_PASSWORD,
            });
        }

        let email = email.trim();
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| PaymentError::WalletUnavailable)?;
        let account = accounts
            .iter_mut()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| PaymentError::AccountNotFound(email.to_string()))?;
        account.password = new_password.to_string();
        info!(email = %account.email, "PayPal password reset");
        Ok(())
    }

    /// Charge the wallet the USD equivalent of `rd_amount` and credit the
    /// rider. Nothing is debited unless the rider is logged in.
    pub fn pay<S, D, C>(
        &self,
        email: &str,
        rd_amount: &str,
        session: &mut SessionManager<S, D, C>,
    ) -> Result<PayPalReceipt, PaymentError>
    where
        S: KeyValueStore,
        D: UserDirectory,
        C: Clock,
    {
        let rd_amount = parse_amount(rd_amount)?;
        if !session.is_authenticated() {
            return Err(SessionError::NotLoggedIn.into());
        }
        let usd = usd_equivalent(rd_amount);
        let email = email.trim();

        let remaining = {
            let mut accounts = self
                .accounts
                .write()
                .map_err(|_| PaymentError::WalletUnavailable)?;
            let account = accounts
                .iter_mut()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .ok_or_else(|| PaymentError::AccountNotFound(email.to_string()))?;
            if account.balance < usd {
                return Err(PaymentError::InsufficientFunds {
                    required: usd,
                    available: account.balance,
                });
            }
            account.balance -= usd;
            account.balance
        };

        let transaction =
            match session.add_transaction(rd_amount, FundingMethod::Paypal, Currency::Usd) {
                Ok(transaction) => transaction,
                Err(e) => {
                    warn!(email = %email, error = %e, "Refunding PayPal charge");
                    self.refund(email, usd);
                    return Err(e.into());
                }
            };

        info!(email = %email, usd, rd_amount, remaining, "PayPal payment completed");
        Ok(PayPalReceipt {
            usd_charged: usd,
            remaining_usd: remaining,
            transaction,
        })
    }

    fn refund(&self, email: &str, usd: f64) {
        let Ok(mut accounts) = self.accounts.write() else {
            error!(email = %email, usd, "PayPal wallets unavailable, refund lost");
            return;
        };
        if let Some(account) = accounts
            .iter_mut()
            .find(|a| a.email.eq_ignore_ascii_case(email))
        {
            account.balance += usd;
        }
    }
}
