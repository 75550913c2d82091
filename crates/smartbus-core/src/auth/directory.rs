//! Account lookup for login and sign-up.
//!
//! The demo ships with an in-memory directory. A real backend would
//! implement `UserDirectory` over its own API.

use std::sync::RwLock;

use tracing::{debug, info};

use super::error::{RegistrationError, RegistrationField};
use crate::models::User;
use crate::validation::is_valid_email;

pub trait UserDirectory: Send + Sync {
    /// Find the account matching the credentials. Both sides are trimmed
    /// and compared verbatim.
    fn authenticate(&self, username: &str, password: &str) -> Option<User>;

    /// Case-insensitive username lookup.
    fn exists(&self, username: &str) -> bool;

    fn register(&self, registration: Registration) -> Result<User, RegistrationError>;
}

/// Sign-up form contents.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    /// Check the form without touching any directory.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let fields = [
            (RegistrationField::FirstName, &self.first_name),
            (RegistrationField::LastName, &self.last_name),
            (RegistrationField::Email, &self.email),
            (RegistrationField::Phone, &self.phone),
            (RegistrationField::Username, &self.username),
            (RegistrationField::Password, &self.password),
            (RegistrationField::ConfirmPassword, &self.confirm_password),
        ];
        let missing: Vec<RegistrationField> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if !missing.is_empty() {
            return Err(RegistrationError::MissingFields(missing));
        }

        if self.password != self.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }

        if !is_valid_email(self.email.trim()) {
            return Err(RegistrationError::InvalidEmail);
        }

        Ok(())
    }

    fn into_user(self) -> User {
        User {
            username: self.username.trim().to_string(),
            password: self.password,
            email: Some(self.email.trim().to_string()),
            phone: Some(self.phone.trim().to_string()),
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Directory seeded with the demo rider and admin accounts.
    pub fn with_demo_users() -> Self {
        Self::new(vec![User::new("Julissa", "12345"), User::new("Admin", "12345")])
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let username = username.trim();
        let password = password.trim();
        let users = self.users.read().ok()?;
        users
            .iter()
            .find(|u| u.username.trim() == username && u.password.trim() == password)
            .cloned()
    }

    fn exists(&self, username: &str) -> bool {
        let username = username.trim().to_lowercase();
        self.users
            .read()
            .map(|users| users.iter().any(|u| u.username.to_lowercase() == username))
            .unwrap_or(false)
    }

    fn register(&self, registration: Registration) -> Result<User, RegistrationError> {
        registration.validate()?;

        if self.exists(&registration.username) {
            debug!(username = %registration.username.trim(), "Username already registered");
            return Err(RegistrationError::UsernameTaken(
                registration.username.trim().to_string(),
            ));
        }

        let user = registration.into_user();
        self.users
            .write()
            .map_err(|_| RegistrationError::DirectoryUnavailable)?
            .push(user.clone());
        info!(username = %user.username, "Registered new user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            email: "ana@example.com".to_string(),
            phone: "809-555-1234".to_string(),
            username: "ana".to_string(),
            password: "secreto".to_string(),
            confirm_password: "secreto".to_string(),
        }
    }

    #[test]
    fn test_authenticate_demo_users() {
        let directory = InMemoryUserDirectory::with_demo_users();
        assert!(directory.authenticate("Julissa", "12345").is_some());
        assert!(directory.authenticate("  Admin ", " 12345 ").is_some());
        assert!(directory.authenticate("julissa", "12345").is_none());
        assert!(directory.authenticate("Julissa", "54321").is_none());
        assert!(directory.authenticate("", "").is_none());
    }

    #[test]
    fn test_register_then_authenticate() {
        let directory = InMemoryUserDirectory::with_demo_users();
        let user = directory.register(registration()).unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(directory.len(), 3);
        assert!(directory.authenticate("ana", "secreto").is_some());
    }

    #[test]
    fn test_register_rejects_taken_username_case_insensitive() {
        let directory = InMemoryUserDirectory::with_demo_users();
        let mut form = registration();
        form.username = "JULISSA".to_string();
        assert_eq!(
            directory.register(form),
            Err(RegistrationError::UsernameTaken("JULISSA".to_string()))
        );
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_register_fails_when_directory_lock_poisoned() {
        let directory = std::sync::Arc::new(InMemoryUserDirectory::with_demo_users());
        let poisoner = directory.clone();
        let _ = std::thread::spawn(move || {
            let _users = poisoner.users.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert_eq!(
            directory.register(registration()),
            Err(RegistrationError::DirectoryUnavailable)
        );
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let form = Registration {
            first_name: "Ana".to_string(),
            phone: "  ".to_string(),
            ..Default::default()
        };
        let Err(RegistrationError::MissingFields(fields)) = form.validate() else {
            panic!("expected missing fields");
        };
        assert_eq!(fields.len(), 6);
        assert!(fields.contains(&RegistrationField::Phone));
        assert!(!fields.contains(&RegistrationField::FirstName));
    }

    #[test]
    fn test_validate_password_mismatch_before_email() {
        let mut form = registration();
        form.email = "not-an-email".to_string();
        form.confirm_password = "otro".to_string();
        assert_eq!(form.validate(), Err(RegistrationError::PasswordMismatch));

        form.confirm_password = form.password.clone();
        assert_eq!(form.validate(), Err(RegistrationError::InvalidEmail));
    }
}
