//! User profile records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::id::DayNumber;
use super::timestamp;

/// `GET /profile`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub health_goal: Option<String>,
    #[serde(default)]
    pub dietary_preference: Option<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default)]
    pub daily_calorie_target: Option<u32>,
    #[serde(default, with = "timestamp::option")]
    pub member_since: Option<NaiveDateTime>,
    #[serde(default)]
    pub current_day: Option<DayNumber>,
}

/// Body of `PUT /profile`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_conditions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_calorie_target: Option<u32>,
}

impl ProfileUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_only_sends_set_fields() {
        let update = ProfileUpdate {
            weight_kg: Some(64.5),
            daily_calorie_target: Some(1800),
            ..ProfileUpdate::default()
        };
        assert!(!update.is_empty());
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(value, serde_json::json!({"weight_kg": 64.5, "daily_calorie_target": 1800}));
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn test_profile_deserialization() {
        let json = r#"{
            "name": "Asha", "email": "asha@example.com", "age": 31,
            "health_conditions": ["pcos"], "daily_calorie_target": 1800,
            "member_since": "2026-02-27 10:00:00", "current_day": 3
        }"#;
        let profile: UserProfile = serde_json::from_str(json).expect("deserialize");
        assert_eq!(profile.current_day, Some(DayNumber::new(3)));
        assert_eq!(profile.health_conditions, vec!["pcos".to_string()]);
    }
}
