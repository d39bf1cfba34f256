//! Aggregate dashboard views.
//!
//! The three views are fetched together and only rendered as a unit, see
//! [`Dashboard`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::id::{DayNumber, MealId};
use super::meal::MealRecord;
use super::timestamp;

/// Per-day totals maintained by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailySummary {
    pub day_number: DayNumber,
    pub date: NaiveDate,
    #[serde(default)]
    pub total_calories: f64,
    #[serde(default)]
    pub total_weight_g: f64,
    #[serde(default)]
    pub total_protein_g: f64,
    #[serde(default)]
    pub total_carbs_g: f64,
    #[serde(default)]
    pub total_fat_g: f64,
    #[serde(default)]
    pub total_fiber_g: f64,
    #[serde(default)]
    pub meal_count: u32,
    #[serde(default)]
    pub avg_healthiness: f64,
    #[serde(default)]
    pub high_sugar_meals: u32,
    #[serde(default)]
    pub high_insulin_risk_meals: u32,
    #[serde(default)]
    pub daily_recommendation: Option<String>,
}

/// `GET /dashboard/today`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodayDashboard {
    pub day_number: DayNumber,
    pub date: NaiveDate,
    #[serde(default)]
    pub calorie_target: Option<u32>,
    #[serde(default)]
    pub meals: Vec<MealRecord>,
    #[serde(default)]
    pub summary: Option<DailySummary>,
}

impl TodayDashboard {
    /// Calories logged today.
    #[must_use]
    pub fn calories_logged(&self) -> f64 {
        self.summary.as_ref().map_or_else(
            || self.meals.iter().filter_map(|m| m.total_calories).sum(),
            |s| s.total_calories,
        )
    }

    /// Fraction of the daily calorie target consumed, if a target is set.
    #[must_use]
    pub fn calorie_progress(&self) -> Option<f64> {
        self.calorie_target
            .filter(|target| *target > 0)
            .map(|target| self.calories_logged() / f64::from(target))
    }

    #[must_use]
    pub fn contains_meal(&self, id: MealId) -> bool {
        self.meals.iter().any(|m| m.id == id)
    }
}

/// `GET /dashboard/history?days=N`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryDashboard {
    pub current_day: DayNumber,
    #[serde(default)]
    pub days: Vec<DailySummary>,
    #[serde(default)]
    pub calorie_target: Option<u32>,
}

/// `GET /dashboard/stats`: lifetime aggregates.
///
/// Averages are `None` until the first meal is logged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LifetimeStats {
    pub current_day: DayNumber,
    #[serde(default, with = "timestamp::option")]
    pub member_since: Option<NaiveDateTime>,
    #[serde(default)]
    pub total_meals: u32,
    #[serde(default)]
    pub avg_calories: Option<f64>,
    #[serde(default)]
    pub avg_weight_g: Option<f64>,
    #[serde(default)]
    pub avg_healthiness: Option<f64>,
    #[serde(default)]
    pub high_sugar_meals: Option<u32>,
    #[serde(default)]
    pub high_insulin_meals: Option<u32>,
    #[serde(default)]
    pub avg_protein: Option<f64>,
    #[serde(default)]
    pub avg_carbs: Option<f64>,
    #[serde(default)]
    pub avg_fat: Option<f64>,
}

/// The three dashboard views, fetched concurrently and joined.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub today: TodayDashboard,
    pub history: HistoryDashboard,
    pub stats: LifetimeStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_today_without_summary() {
        let json = r#"{
            "day_number": 1,
            "date": "2026-03-01",
            "calorie_target": 2000,
            "meals": [],
            "summary": null
        }"#;
        let today: TodayDashboard = serde_json::from_str(json).expect("deserialize");
        assert!(today.summary.is_none());
        assert_eq!(today.calorie_progress(), Some(0.0));
    }

    #[test]
    fn test_calorie_progress_uses_summary() {
        let json = r#"{
            "day_number": 2,
            "date": "2026-03-02",
            "calorie_target": 2000,
            "meals": [{"id": 9, "day_number": 2, "meal_number": 1, "meal_type": "lunch", "total_calories": 700}],
            "summary": {"day_number": 2, "date": "2026-03-02", "total_calories": 1000, "meal_count": 1}
        }"#;
        let today: TodayDashboard = serde_json::from_str(json).expect("deserialize");
        assert_eq!(today.calorie_progress(), Some(0.5));
        assert!(today.contains_meal(MealId::new(9)));
    }

    #[test]
    fn test_stats_before_first_meal() {
        let json = r#"{
            "current_day": 1,
            "member_since": "2026-03-01 07:00:00",
            "total_meals": 0,
            "avg_calories": null,
            "high_sugar_meals": null
        }"#;
        let stats: LifetimeStats = serde_json::from_str(json).expect("deserialize");
        assert_eq!(stats.total_meals, 0);
        assert!(stats.avg_calories.is_none());
        assert!(stats.member_since.is_some());
    }
}
