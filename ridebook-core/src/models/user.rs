use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::BookingError;

/// User role. Fixed at signup; no operation changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sqlx(rename = "customer")]
    Customer,

    #[sqlx(rename = "driver")]
    Driver,

    #[sqlx(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(BookingError::validation(format!("unknown role '{}'", other))),
        }
    }
}

/// User model representing a registered account.
///
/// This struct maps to the `users` table. The email is the stable,
/// case-sensitive identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// User's email address (unique)
    pub email: String,

    /// Display name
    pub username: String,

    /// Bcrypt hashed password
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: Role,

    pub full_name: Option<String>,

    pub address: Option<String>,

    pub phone_number: Option<String>,

    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,
}

/// Optional profile fields collected at signup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

/// Signup request (plain password, hashed before it reaches the store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
}

/// User row ready to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("Driver".parse::<Role>(), Ok(Role::Driver));
        assert_eq!(" admin ".parse::<Role>(), Ok(Role::Admin));
        assert!("dispatcher".parse::<Role>().is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            email: "customer@test.com".to_string(),
            username: "customer1".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Customer,
            full_name: Some("Test Customer".to_string()),
            address: None,
            phone_number: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "customer");
    }
}
