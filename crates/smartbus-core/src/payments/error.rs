use thiserror::Error;

use crate::auth::SessionError;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Full name is required")]
    MissingName,

    #[error("Phone number is required")]
    MissingPhone,

    #[error("Invalid phone number {0:?}, use 809-123-4567")]
    InvalidPhone(String),

    #[error("Please fill in every field")]
    MissingFields,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("An account already exists for {0}")]
    EmailTaken(String),

    #[error("No PayPal account for {0}")]
    AccountNotFound(String),

    #[error("PayPal wallets unavailable")]
    WalletUnavailable,

    #[error("Insufficient PayPal balance: USD {required:.2} needed, USD {available:.2} available")]
    InsufficientFunds { required: f64, available: f64 },

    #[error(transparent)]
    Session(#[from] SessionError),
}
