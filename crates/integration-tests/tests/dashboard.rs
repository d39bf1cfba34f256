//! Integration tests for the dashboard views and meal management.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use nutriscan_client::{ClientError, MealPhoto, MealQuery, NutriScanClient};
use nutriscan_core::{Credential, DayNumber, MealId, MealType};
use nutriscan_integration_tests::MockApi;

const EMAIL: &str = "kiran@example.com";

async fn signed_in(mock: &MockApi, dir: &tempfile::TempDir) -> NutriScanClient {
    let token = mock.seed_user(EMAIL, "pw", "Kiran");
    let client = mock.client(dir.path()).await;
    client.session().sign_in(Credential::new(token)).unwrap();
    client
}

async fn log_meal(client: &NutriScanClient, meal_type: MealType) -> MealId {
    let photo = MealPhoto::new("plate.png", vec![0x89, b'P', b'N', b'G', 0, 1]);
    client
        .api()
        .analyze_meal(&photo, meal_type)
        .await
        .unwrap()
        .meal_id
}

// =============================================================================
// Dashboard
// =============================================================================

#[tokio::test]
async fn test_empty_dashboard() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;

    let dashboard = client.api().dashboard(7).await.unwrap();
    assert!(dashboard.today.meals.is_empty());
    assert!(dashboard.today.summary.is_none());
    assert_eq!(dashboard.today.calorie_progress(), Some(0.0));
    assert!(dashboard.history.days.is_empty());
    assert_eq!(dashboard.stats.total_meals, 0);
    assert_eq!(dashboard.stats.avg_calories, None);
}

#[tokio::test]
async fn test_dashboard_reflects_logged_meals() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let breakfast = log_meal(&client, MealType::Breakfast).await;
    let lunch = log_meal(&client, MealType::Lunch).await;

    let dashboard = client.api().dashboard(7).await.unwrap();
    assert!(dashboard.today.contains_meal(breakfast));
    assert!(dashboard.today.contains_meal(lunch));
    assert!((dashboard.today.calories_logged() - 700.0).abs() < f64::EPSILON);
    assert_eq!(dashboard.history.days.len(), 1);
    assert_eq!(dashboard.history.days[0].meal_count, 2);
    assert_eq!(dashboard.stats.total_meals, 2);
    assert_eq!(dashboard.stats.avg_calories, Some(350.0));
}

#[tokio::test]
async fn test_slow_view_fails_whole_dashboard() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let _ = log_meal(&client, MealType::Dinner).await;

    // Longer than the client's request timeout.
    mock.delay_stats(Duration::from_secs(10));
    let started = tokio::time::Instant::now();
    let err = client.api().dashboard(7).await.unwrap_err();

    assert!(err.is_network());
    assert!(started.elapsed() < Duration::from_secs(10));
    // The other views still work on their own.
    client.api().today().await.unwrap();
    client.api().history(7).await.unwrap();
}

#[tokio::test]
async fn test_failing_view_fails_whole_dashboard() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;

    mock.fail("/dashboard/history", 500, serde_json::json!("history unavailable"));
    let err = client.api().dashboard(7).await.unwrap_err();
    assert!(matches!(err, ClientError::Request { status: 500, .. }));
}

// =============================================================================
// Meals
// =============================================================================

#[tokio::test]
async fn test_delete_then_refresh_omits_meal() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let kept = log_meal(&client, MealType::Breakfast).await;
    let removed = log_meal(&client, MealType::Snack).await;

    let dashboard = client
        .api()
        .delete_meal_and_refresh(removed, 7)
        .await
        .unwrap();

    assert!(dashboard.today.contains_meal(kept));
    assert!(!dashboard.today.contains_meal(removed));
    assert_eq!(dashboard.stats.total_meals, 1);
    assert_eq!(mock.meal_count(EMAIL), 1);
}

#[tokio::test]
async fn test_delete_missing_meal_is_not_found() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;

    let err = client.api().delete_meal(MealId::new(404)).await.unwrap_err();
    match err {
        ClientError::Request { status, detail } => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Meal not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_response_echoes_id() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let id = log_meal(&client, MealType::Lunch).await;

    let response = client.api().delete_meal(id).await.unwrap();
    assert_eq!(response.meal_id, id);
    assert_eq!(response.message, "Meal deleted");
}

#[tokio::test]
async fn test_meal_list_filters_and_pages() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let first = log_meal(&client, MealType::Breakfast).await;
    let second = log_meal(&client, MealType::Lunch).await;

    let all = client.api().meals(MealQuery::default()).await.unwrap();
    assert_eq!(all.meals.len(), 2);

    let paged = client
        .api()
        .meals(MealQuery {
            limit: Some(1),
            offset: Some(1),
            ..MealQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.meals.len(), 1);
    assert_eq!(paged.meals[0].id, second);
    assert_ne!(paged.meals[0].id, first);

    let other_day = client
        .api()
        .meals(MealQuery {
            day: Some(DayNumber::new(1)),
            ..MealQuery::default()
        })
        .await
        .unwrap();
    assert!(other_day.meals.is_empty());
}
