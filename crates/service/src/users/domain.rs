use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::storage::Record;

/// Stored user. `password` holds an Argon2 PHC hash string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

/// User as shown to API clients (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self { id: u.id, username: u.username, email: u.email }
    }
}

/// Registration input (plaintext password).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.username.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(ServiceError::Validation("username, email and password are required".into()));
        }
        Ok(())
    }
}

/// Partial update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let has_any = [&self.username, &self.email, &self.password]
            .iter()
            .any(|f| f.as_deref().is_some_and(|v| !v.is_empty()));
        if !has_any {
            return Err(ServiceError::Validation("provide at least one field to update".into()));
        }
        Ok(())
    }
}

/// Login input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(ServiceError::Validation("email and password are required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_view_drops_hash() {
        let u = User { id: "1".into(), username: "alice".into(), email: "a@x.com".into(), password: "$argon2id$...".into() };
        let json = serde_json::to_value(PublicUser::from(u)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn patch_needs_one_field() {
        assert!(UserPatch::default().validate().is_err());
        assert!(UserPatch { email: Some(String::new()), ..Default::default() }.validate().is_err());
        assert!(UserPatch { username: Some("bob".into()), ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn new_user_requires_all_fields() {
        let missing: NewUser = serde_json::from_str(r#"{"username":"alice","email":"a@x.com"}"#).unwrap();
        assert!(missing.validate().is_err());
        let full = NewUser { password: "secret".into(), ..missing };
        assert!(full.validate().is_ok());
    }
}
