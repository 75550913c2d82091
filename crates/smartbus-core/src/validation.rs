//! Shared input validation for sign-up and payment forms.

use std::sync::OnceLock;

use regex::Regex;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();
static PHONE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Loose email check: something@something.something, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
        .is_match(email)
}

/// Dominican Republic phone number: 809/829/849 area code, optional dashes,
/// e.g. `809-123-4567`. Whitespace is ignored.
pub fn is_valid_dominican_phone(phone: &str) -> bool {
    let cleaned: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE_PATTERN
        .get_or_init(|| {
            Regex::new(r"^(809|829|849)-?\d{3}-?\d{4}$").expect("valid phone regex")
        })
        .is_match(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("usuario@paypal.com"));
        assert!(!is_valid_email("usuario@paypal"));
        assert!(!is_valid_email("two words@mail.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_dominican_phone_validation() {
        assert!(is_valid_dominican_phone("809-123-4567"));
        assert!(is_valid_dominican_phone("8291234567"));
        assert!(is_valid_dominican_phone("849 123 4567"));
        assert!(!is_valid_dominican_phone("305-123-4567"));
        assert!(!is_valid_dominican_phone("809-123-456"));
    }
}
