//! Authentication credential types.
//!
//! The service issues an opaque bearer token on login and registration. The
//! token is wrapped in [`Credential`] so it is never printed by `Debug` and
//! can only be read through an explicit [`Credential::expose`] call.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque bearer token proving an authenticated session.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Read the raw token.
    ///
    /// Only the request gateway and the persisted session store should call
    /// this.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// `Authorization` header value for this credential.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Response of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Newly issued credential.
    pub token: Credential,
    /// Display name (login only).
    #[serde(default)]
    pub name: Option<String>,
    /// Human readable message (registration only).
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /register`.
///
/// Everything past `name` is optional onboarding data; the service applies
/// its own defaults for omitted fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary_preference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub health_conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_calorie_target: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("abc123");
        assert_eq!(format!("{credential:?}"), "Credential([REDACTED])");
        assert_eq!(credential.bearer(), "Bearer abc123");
    }

    #[test]
    fn test_auth_response_login_shape() {
        let json = r#"{"token": "deadbeef", "name": "Asha"}"#;
        let response: AuthResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.token.expose(), "deadbeef");
        assert_eq!(response.name.as_deref(), Some("Asha"));
        assert!(response.message.is_none());
    }

    #[test]
    fn test_register_request_skips_empty_fields() {
        let request = RegisterRequest {
            email: "a@b.co".to_string(),
            password: "pw".to_string(),
            name: "A".to_string(),
            ..RegisterRequest::default()
        };
        let value = serde_json::to_value(&request).expect("serialize");
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 3);
        assert!(!object.contains_key("health_conditions"));
    }
}
