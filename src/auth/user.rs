use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RustyKeysError};

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Storage-assigned identifier (0 until persisted)
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Unique, stored lowercased
    pub email: String,
    /// PHC-format Argon2id string, never the password itself
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Profile fields supplied at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub active: bool,
}

impl NewUser {
    /// Creates an active profile
    pub fn new(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Trim names, normalise the email and check required fields
    pub fn validated(self) -> Result<Self> {
        let first_name = require_field("first_name", &self.first_name)?;
        let last_name = require_field("last_name", &self.last_name)?;
        let email = normalize_email(&self.email)?;

        Ok(Self {
            first_name,
            last_name,
            email,
            active: self.active,
        })
    }
}

/// Partial profile update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

impl UserUpdate {
    /// Apply to `user` in place, validating every provided field
    pub fn apply_to(&self, user: &mut User) -> Result<()> {
        if let Some(first_name) = &self.first_name {
            user.first_name = require_field("first_name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = require_field("last_name", last_name)?;
        }
        if let Some(email) = &self.email {
            user.email = normalize_email(email)?;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        Ok(())
    }
}

/// Who a credential represents, as handed to the surrounding application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

fn require_field(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RustyKeysError::ValidationError(format!(
            "{}: this field is required",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// Lowercase and sanity-check an email address
///
/// Accepts `local@domain.tld` with no whitespace; deliverability is not our concern.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let invalid = || RustyKeysError::ValidationError(format!("email: invalid address {:?}", email));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_validation_trims_and_lowercases() {
        let profile = NewUser::new("  John ", "Doe", " John@Doe.COM ").validated().unwrap();
        assert_eq!(profile.first_name, "John");
        assert_eq!(profile.email, "john@doe.com");
        assert!(profile.active);
    }

    #[test]
    fn test_required_fields() {
        let err = NewUser::new("", "Doe", "john@doe.com").validated().unwrap_err();
        assert!(err.to_string().contains("first_name"));

        let err = NewUser::new("John", "   ", "john@doe.com").validated().unwrap_err();
        assert!(err.to_string().contains("last_name"));
    }

    #[test]
    fn test_email_shapes() {
        assert!(normalize_email("a@b.co").is_ok());
        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign.com").is_err());
        assert!(normalize_email("@doe.com").is_err());
        assert!(normalize_email("john@localhost").is_err());
        assert!(normalize_email("john@doe..com").is_err());
        assert!(normalize_email("jo hn@doe.com").is_err());
        assert!(normalize_email("john@doe@com.org").is_err());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john@doe.com".to_string(),
            password_digest: "x".to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let update = UserUpdate {
            first_name: Some("Jane".to_string()),
            email: Some("Jane@Doe.com".to_string()),
            ..UserUpdate::default()
        };
        update.apply_to(&mut user).unwrap();

        assert_eq!(user.first_name, "Jane");
        assert_eq!(user.last_name, "Doe");
        assert_eq!(user.email, "jane@doe.com");
        assert!(user.active);
    }

    #[test]
    fn test_serialized_user_has_no_digest() {
        let now = Utc::now();
        let user = User {
            id: 7,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john@doe.com".to_string(),
            password_digest: "$argon2id$secret".to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_digest"));
        assert_eq!(user.full_name(), "John Doe");
    }
}
