use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub mod handler;

/// Database model for a user. Relations are never embedded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    #[sqlx(rename = "user_id")]
    pub id: i64,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: Option<NaiveDate>,
}

/// Request payload for creating or updating a user
#[derive(Debug, Deserialize, Validate)]
pub struct UserPayload {
    pub id: Option<i64>,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "Login cannot be blank"))]
    pub login: String,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

/// A user that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: Option<NaiveDate>,
}

impl UserPayload {
    /// Display name falls back to the login when missing or blank.
    pub fn into_new_user(self) -> NewUser {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.login.clone(),
        };

        NewUser {
            email: self.email,
            login: self.login,
            name,
            birthday: self.birthday,
        }
    }
}

impl NewUser {
    pub fn with_id(self, id: i64) -> User {
        User {
            id,
            email: self.email,
            login: self.login,
            name: self.name,
            birthday: self.birthday,
        }
    }
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
