//! Meal analysis results and logged meal records.
//!
//! [`MealAnalysisResult`] is what `POST /meals/analyze` returns for a fresh
//! photo. [`MealRecord`] is the flattened, stored form the dashboard and meal
//! listing endpoints return. Numeric fields are `f64` because the analysis
//! model is free to answer with fractional estimates.

use chrono::NaiveDateTime;
use serde::Deserialize;

use super::id::{DayNumber, MealId};
use super::status::{Confidence, GlycemicImpact, MealType, RiskLevel};
use super::timestamp;

/// Structured analysis of one meal photo. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealAnalysisResult {
    pub meal_id: MealId,
    pub day_number: DayNumber,
    pub meal_number: u32,
    pub meal_type: MealType,
    #[serde(default)]
    pub meal_format: Option<String>,
    pub meal_name: String,
    #[serde(default)]
    pub confidence: Confidence,
    pub total_calories: f64,
    #[serde(default)]
    pub total_weight_g: f64,
    pub macros: Macros,
    pub sugar_spike: SugarSpike,
    #[serde(default)]
    pub insulin_resistance: InsulinResistance,
    #[serde(default)]
    pub items: Vec<MealItem>,
    #[serde(default)]
    pub micronutrients: Micronutrients,
    #[serde(default)]
    pub health_notes: Option<String>,
    pub healthiness_score: f64,
    #[serde(default)]
    pub recommendations: Option<String>,
}

/// Macronutrients in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Macros {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
}

/// Predicted blood-sugar response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SugarSpike {
    pub glycemic_impact: GlycemicImpact,
    #[serde(default)]
    pub estimated_peak_mg_dl: Option<f64>,
    #[serde(default)]
    pub time_to_peak_minutes: Option<f64>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InsulinResistance {
    #[serde(default)]
    pub risk: RiskLevel,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// One identified item on the plate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealItem {
    pub name: String,
    #[serde(default)]
    pub portion: Option<String>,
    #[serde(default)]
    pub weight_g: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Micronutrients {
    #[serde(default)]
    pub notable: Vec<String>,
    #[serde(default)]
    pub lacking: Vec<String>,
}

/// A logged meal as stored by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealRecord {
    pub id: MealId,
    pub day_number: DayNumber,
    pub meal_number: u32,
    pub meal_type: String,
    #[serde(default)]
    pub meal_format: Option<String>,
    #[serde(default)]
    pub meal_name: Option<String>,
    #[serde(default)]
    pub total_calories: Option<f64>,
    #[serde(default)]
    pub total_weight_g: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub fat_g: Option<f64>,
    #[serde(default)]
    pub fiber_g: Option<f64>,
    #[serde(default)]
    pub glycemic_impact: Option<GlycemicImpact>,
    #[serde(default)]
    pub sugar_peak_mg_dl: Option<f64>,
    #[serde(default)]
    pub sugar_peak_minutes: Option<f64>,
    #[serde(default)]
    pub sugar_explanation: Option<String>,
    #[serde(default)]
    pub insulin_resistance_risk: Option<RiskLevel>,
    #[serde(default)]
    pub insulin_resistance_explanation: Option<String>,
    #[serde(default)]
    pub healthiness_score: Option<f64>,
    #[serde(default)]
    pub health_notes: Option<String>,
    #[serde(default)]
    pub recommendations: Option<String>,
    /// Item breakdown, JSON-encoded by the service.
    #[serde(default)]
    pub items_json: Option<String>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default, with = "timestamp::option")]
    pub logged_at: Option<NaiveDateTime>,
}

impl MealRecord {
    /// Decode the stored item breakdown.
    ///
    /// # Errors
    ///
    /// Returns an error if `items_json` is present but not a JSON item list.
    pub fn items(&self) -> Result<Vec<MealItem>, serde_json::Error> {
        match self.items_json.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw),
        }
    }
}

/// Response of `GET /dashboard/meals`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealList {
    pub meals: Vec<MealRecord>,
}

/// Response of `DELETE /meals/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteMealResponse {
    pub message: String,
    pub meal_id: MealId,
}
