use serde::{Deserialize, Serialize};

/// An account in the user directory.
///
/// The password is compared verbatim and never persisted by the session
/// manager; only `UserProfile` leaves the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
            phone: None,
            first_name: None,
            last_name: None,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Identity of the logged-in user, as persisted in the session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Name shown in greetings: first + last name when known, else the username.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.username.eq_ignore_ascii_case("admin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_drops_password() {
        let user = User::new("Julissa", "12345");
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert_eq!(json, r#"{"username":"Julissa"}"#);
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut profile = User::new("Admin", "12345").profile();
        assert_eq!(profile.display_name(), "Admin");
        assert!(profile.is_admin());

        profile.first_name = Some("Ana".to_string());
        profile.last_name = Some("López".to_string());
        assert_eq!(profile.display_name(), "Ana López");
    }
}
