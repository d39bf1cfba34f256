//! Plain-text rendering of service records.

use std::fmt::Write;

use nutriscan_core::{
    Dashboard, MealAnalysisResult, MealRecord, OrderDescriptor, SubscriptionHistory,
    SubscriptionStatus, UserProfile, VerifiedSubscription,
};

const TIMESTAMP: &str = "%Y-%m-%d %H:%M";

pub fn analysis(result: &MealAnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}, meal {} of {})",
        result.meal_name, result.meal_type, result.meal_number, result.day_number
    );
    if let Some(format) = &result.meal_format {
        let _ = writeln!(out, "Format: {format}");
    }
    let _ = writeln!(
        out,
        "Calories: {:.0} kcal, {:.0} g total (confidence {})",
        result.total_calories, result.total_weight_g, result.confidence
    );
    let macros = &result.macros;
    let _ = writeln!(
        out,
        "Protein {:.1} g | Carbs {:.1} g | Fat {:.1} g | Fiber {:.1} g",
        macros.protein_g, macros.carbs_g, macros.fat_g, macros.fiber_g
    );

    let spike = &result.sugar_spike;
    let _ = write!(out, "Sugar spike: {}", spike.glycemic_impact);
    if let Some(peak) = spike.estimated_peak_mg_dl {
        let _ = write!(out, ", peak ~{peak:.0} mg/dL");
    }
    if let Some(minutes) = spike.time_to_peak_minutes {
        let _ = write!(out, " after {minutes:.0} min");
    }
    out.push('\n');
    let _ = writeln!(out, "Insulin resistance risk: {}", result.insulin_resistance.risk);

    if !result.items.is_empty() {
        out.push_str("Items:\n");
        for item in &result.items {
            let _ = write!(out, "  - {}", item.name);
            if let Some(portion) = &item.portion {
                let _ = write!(out, " ({portion})");
            }
            if let Some(calories) = item.calories {
                let _ = write!(out, ": {calories:.0} kcal");
            }
            out.push('\n');
        }
    }
    if !result.micronutrients.lacking.is_empty() {
        let _ = writeln!(out, "Lacking: {}", result.micronutrients.lacking.join(", "));
    }
    let _ = writeln!(out, "Healthiness: {:.0}/10", result.healthiness_score);
    if let Some(recommendations) = &result.recommendations {
        let _ = writeln!(out, "Tip: {recommendations}");
    }
    out.trim_end().to_string()
}

pub fn dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    let today = &dashboard.today;

    let _ = write!(
        out,
        "{} ({}): {:.0} kcal logged",
        today.day_number,
        today.date,
        today.calories_logged()
    );
    if let (Some(target), Some(progress)) = (today.calorie_target, today.calorie_progress()) {
        let _ = write!(out, " of {target} ({:.0}%)", progress * 100.0);
    }
    out.push('\n');
    if today.meals.is_empty() {
        out.push_str("  No meals logged yet today\n");
    } else {
        out.push_str(&meals(&today.meals));
        out.push('\n');
    }

    if !dashboard.history.days.is_empty() {
        out.push_str("\nHistory:\n");
        for day in &dashboard.history.days {
            let _ = writeln!(
                out,
                "  {} {}: {:.0} kcal over {} meals, healthiness {:.1}",
                day.day_number, day.date, day.total_calories, day.meal_count, day.avg_healthiness
            );
        }
    }

    let stats = &dashboard.stats;
    let _ = write!(out, "\nLifetime: {} meals", stats.total_meals);
    if let Some(avg) = stats.avg_calories {
        let _ = write!(out, ", avg {avg:.0} kcal");
    }
    if let Some(avg) = stats.avg_healthiness {
        let _ = write!(out, ", avg healthiness {avg:.1}");
    }
    if let Some(high) = stats.high_sugar_meals {
        let _ = write!(out, ", {high} high-sugar");
    }
    out
}

pub fn meals(meals: &[MealRecord]) -> String {
    if meals.is_empty() {
        return "No meals found".to_string();
    }
    let mut out = String::new();
    for meal in meals {
        let _ = write!(
            out,
            "  #{} {} meal {} [{}] {}",
            meal.id,
            meal.day_number,
            meal.meal_number,
            meal.meal_type,
            meal.meal_name.as_deref().unwrap_or("Unnamed meal")
        );
        if let Some(calories) = meal.total_calories {
            let _ = write!(out, ": {calories:.0} kcal");
        }
        if meal.glycemic_impact.is_some_and(|impact| impact.is_high()) {
            out.push_str(" (high sugar)");
        }
        out.push('\n');
    }
    out.trim_end_matches('\n').to_string()
}

pub fn subscription_status(status: &SubscriptionStatus) -> String {
    let plan = status.plan_label().unwrap_or("NutriScan Pro");
    if status.active && !status.is_trial {
        return status.expires_at.map_or_else(
            || format!("{plan} is active"),
            |expires| format!("{plan} is active until {}", expires.format(TIMESTAMP)),
        );
    }
    if status.active {
        return format!(
            "Free trial: {} of {} scans left",
            status.remaining_free_scans(),
            status.free_scans_total
        );
    }

    let mut out = format!(
        "Free trial used up ({} of {} scans)",
        status.free_scans_used, status.free_scans_total
    );
    if let Some(price) = status.plan_price() {
        let _ = write!(out, "\nSubscribe to {plan} for {price}");
        if let Some(days) = status.plan_duration_days {
            let _ = write!(out, " / {days} days");
        }
    }
    out
}

pub fn activation(verified: &VerifiedSubscription) -> String {
    let mut out = verified
        .message
        .clone()
        .unwrap_or_else(|| "Subscription activated".to_string());
    if let Some(expires) = verified.expires_at {
        let _ = write!(out, "\nActive until {}", expires.format(TIMESTAMP));
    }
    out
}

pub fn subscription_history(history: &SubscriptionHistory) -> String {
    if history.subscriptions.is_empty() {
        return "No subscription payments yet".to_string();
    }
    let mut out = String::new();
    for record in &history.subscriptions {
        let created = record
            .created_at
            .map_or_else(|| "-".to_string(), |at| at.format(TIMESTAMP).to_string());
        let _ = write!(out, "  {created}  {}  {}", record.amount(), record.status);
        if let Some(expires) = record.expires_at {
            let _ = write!(out, "  until {}", expires.format(TIMESTAMP));
        }
        out.push('\n');
    }
    out.trim_end_matches('\n').to_string()
}

pub fn profile(profile: &UserProfile) -> String {
    let mut out = format!("{} <{}>", profile.name, profile.email);
    if let Some(day) = profile.current_day {
        let _ = write!(out, "\n{day} of your program");
    }
    let fields = [
        ("Age", profile.age.map(|v| v.to_string())),
        ("Gender", profile.gender.clone()),
        ("Weight", profile.weight_kg.map(|v| format!("{v} kg"))),
        ("Height", profile.height_cm.map(|v| format!("{v} cm"))),
        ("Activity", profile.activity_level.clone()),
        ("Goal", profile.health_goal.clone()),
        ("Diet", profile.dietary_preference.clone()),
        (
            "Calorie target",
            profile.daily_calorie_target.map(|v| format!("{v} kcal")),
        ),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = write!(out, "\n{label}: {value}");
        }
    }
    if !profile.health_conditions.is_empty() {
        let _ = write!(out, "\nConditions: {}", profile.health_conditions.join(", "));
    }
    out
}

pub fn order(order: &OrderDescriptor) -> String {
    format!(
        "{}: {}\n{} (order {}, key {})",
        order.name,
        order.description,
        order.price(),
        order.order_id,
        order.key_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: &str) -> SubscriptionStatus {
        serde_json::from_str(json).expect("deserialize")
    }

    #[test]
    fn test_trial_status() {
        let text = subscription_status(&status(
            r#"{"active": true, "is_trial": true, "free_scans_used": 1, "free_scans_total": 3}"#,
        ));
        assert_eq!(text, "Free trial: 2 of 3 scans left");
    }

    #[test]
    fn test_exhausted_trial_offers_plan() {
        let text = subscription_status(&status(
            r#"{"active": false, "is_trial": false, "free_scans_used": 3, "free_scans_total": 3,
                "plan_name": "NutriScan Pro", "plan_amount": 299.0, "plan_duration_days": 30}"#,
        ));
        assert!(text.starts_with("Free trial used up (3 of 3 scans)"));
        assert!(text.contains("₹299.00 / 30 days"));
    }

    #[test]
    fn test_paid_status() {
        let text = subscription_status(&status(
            r#"{"active": true, "plan": "NutriScan Pro", "expires_at": "2026-11-18T09:30:00"}"#,
        ));
        assert_eq!(text, "NutriScan Pro is active until 2026-11-18 09:30");
    }

    #[test]
    fn test_empty_meal_list() {
        assert_eq!(meals(&[]), "No meals found");
    }
}
