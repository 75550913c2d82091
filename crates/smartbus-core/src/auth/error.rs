use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Session storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Form fields checked during sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationField {
    FirstName,
    LastName,
    Email,
    Phone,
    Username,
    Password,
    ConfirmPassword,
}

impl RegistrationField {
    pub fn label(&self) -> &'static str {
        match self {
            RegistrationField::FirstName => "first name",
            RegistrationField::LastName => "last name",
            RegistrationField::Email => "email",
            RegistrationField::Phone => "phone",
            RegistrationField::Username => "username",
            RegistrationField::Password => "password",
            RegistrationField::ConfirmPassword => "confirm password",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Missing required fields: {}", .0.iter().map(|f| f.label()).collect::<Vec<_>>().join(", "))]
    MissingFields(Vec<RegistrationField>),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("User directory unavailable")]
    DirectoryUnavailable,
}
