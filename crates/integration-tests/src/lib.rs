//! Integration tests for the NutriScan client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nutriscan-integration-tests
//! ```
//!
//! Every test starts its own [`MockApi`]: an in-process `axum` server bound
//! to `127.0.0.1:0` that implements the service endpoints with in-memory
//! state. Tests inspect that state (recorded `Authorization` headers, call
//! counters) to assert what the client actually sent.
//!
//! # Test Categories
//!
//! - `session_gateway` - Credentials, 401 handling, error classification
//! - `subscription_gate` - Paywall state machine and payment flow
//! - `offline_cache` - Network-first fallback and cache versioning
//! - `dashboard` - Concurrent dashboard reads and delete-then-refresh

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use nutriscan_client::{
    CacheVersion, CheckoutError, CheckoutWidget, ClientConfig, KeyValueStore, MemoryStore,
    NutriScanClient,
};
use nutriscan_core::{OrderDescriptor, ProviderConfirmation};
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

/// Scans allowed before the paywall.
pub const FREE_SCANS: u32 = 2;
pub const PLAN_AMOUNT_PAISE: i64 = 30_000;
pub const PLAN_NAME: &str = "NutriScan Pro (3 months)";
const CURRENT_DAY: u32 = 3;
const TODAY: &str = "2026-03-05";

/// Signature the mock accepts for a provider confirmation.
#[must_use]
pub fn signature_for(order_id: &str, payment_id: &str) -> String {
    format!("sig:{order_id}:{payment_id}")
}

// =============================================================================
// Mock state
// =============================================================================

/// An `Authorization` header as received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
struct User {
    password: String,
    name: String,
    profile: Map<String, Value>,
    paid: bool,
    subscriptions: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockData {
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    orders: HashMap<String, String>,
    meals: Vec<(String, Value)>,
    next_id: i64,
    auth_log: Vec<AuthRecord>,
    stats_delay: Option<Duration>,
    failures: HashMap<String, (StatusCode, Value)>,
}

/// Shared state behind the mock service.
#[derive(Debug, Default)]
pub struct MockState {
    data: Mutex<MockData>,
    analyze_calls: AtomicU32,
    verify_calls: AtomicU32,
    health_calls: AtomicU32,
}

impl MockState {
    fn data(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> i64 {
        let mut data = self.data();
        data.next_id += 1;
        data.next_id
    }
}

// =============================================================================
// MockApi
// =============================================================================

/// In-process NutriScan service.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: Option<JoinHandle<()>>,
}

impl MockApi {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api address");
        let app = router(Arc::clone(&state));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn api_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}/api", self.addr)).expect("mock api url")
    }

    /// Client configuration for this mock with data under `data_dir`.
    #[must_use]
    pub fn config(&self, data_dir: &Path) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url(), data_dir);
        config.connect_timeout = Duration::from_secs(1);
        config.request_timeout = Duration::from_secs(2);
        config.cache.allow = vec!["/health".to_string()];
        config
    }

    /// Client over in-memory session storage.
    pub async fn client(&self, data_dir: &Path) -> NutriScanClient {
        self.client_with(self.config(data_dir), Arc::new(MemoryStore::new()))
            .await
    }

    /// Client with explicit configuration and storage.
    pub async fn client_with(
        &self,
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> NutriScanClient {
        NutriScanClient::with_http(config.clone(), http_client(&config), storage)
            .await
            .expect("build client")
    }

    /// Stop serving. Later connections are refused.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures and inspection
    // -------------------------------------------------------------------------

    /// Create an account directly and return its token.
    #[must_use]
    pub fn seed_user(&self, email: &str, password: &str, name: &str) -> String {
        let mut data = self.state.data();
        data.users.insert(
            email.to_string(),
            User {
                password: password.to_string(),
                name: name.to_string(),
                ..User::default()
            },
        );
        issue_token(&mut data, email)
    }

    /// Invalidate every issued token, as a server-side logout would.
    pub fn revoke_tokens(&self) {
        self.state.data().tokens.clear();
    }

    /// Grant a paid subscription without going through checkout.
    pub fn grant_subscription(&self, email: &str) {
        if let Some(user) = self.state.data().users.get_mut(email) {
            user.paid = true;
        }
    }

    /// Respond to `path` with `status` and `{"detail": detail}` until cleared.
    pub fn fail(&self, path: &str, status: u16, detail: Value) {
        let status = StatusCode::from_u16(status).expect("status code");
        self.state
            .data()
            .failures
            .insert(path.to_string(), (status, json!({ "detail": detail })));
    }

    pub fn clear_failures(&self) {
        self.state.data().failures.clear();
    }

    /// Delay every `/dashboard/stats` response, before its token is checked.
    pub fn delay_stats(&self, delay: Duration) {
        self.state.data().stats_delay = Some(delay);
    }

    #[must_use]
    pub fn auth_log(&self) -> Vec<AuthRecord> {
        self.state.data().auth_log.clone()
    }

    #[must_use]
    pub fn meal_count(&self, email: &str) -> usize {
        self.state
            .data()
            .meals
            .iter()
            .filter(|(owner, _)| owner == email)
            .count()
    }

    #[must_use]
    pub fn analyze_calls(&self) -> u32 {
        self.state.analyze_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn verify_calls(&self) -> u32 {
        self.state.verify_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn health_calls(&self) -> u32 {
        self.state.health_calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// HTTP client that never reuses connections, so a stopped mock is
/// observed as a transport failure immediately.
#[must_use]
pub fn http_client(config: &ClientConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(0)
        .build()
        .expect("build http client")
}

/// Persisted cache version for tests that reopen a client.
#[must_use]
pub fn version(tag: &str) -> CacheVersion {
    tag.parse().expect("cache version")
}

// =============================================================================
// Scripted checkout
// =============================================================================

/// What the scripted checkout does on its next invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Pay and return a correctly signed confirmation.
    Pay,
    /// Pay but return a confirmation the server rejects.
    PayWithBadSignature,
    /// Return a confirmation for a different order.
    PayForOtherOrder,
    Cancel,
    Fail(String),
}

/// Checkout widget that follows a script instead of asking a user.
#[derive(Debug, Default)]
pub struct ScriptedCheckout {
    script: Mutex<VecDeque<Script>>,
    orders: Mutex<Vec<OrderDescriptor>>,
}

impl ScriptedCheckout {
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            orders: Mutex::default(),
        }
    }

    /// Orders the widget was opened for.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderDescriptor> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CheckoutWidget for ScriptedCheckout {
    async fn begin_checkout(
        &self,
        order: &OrderDescriptor,
    ) -> Result<ProviderConfirmation, CheckoutError> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());
        let step = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Script::Cancel);

        let payment_id = format!("pay_for_{}", order.order_id);
        match step {
            Script::Pay => Ok(ProviderConfirmation {
                signature: signature_for(&order.order_id, &payment_id),
                order_id: order.order_id.clone(),
                payment_id,
            }),
            Script::PayWithBadSignature => Ok(ProviderConfirmation {
                order_id: order.order_id.clone(),
                payment_id,
                signature: "forged".to_string(),
            }),
            Script::PayForOtherOrder => Ok(ProviderConfirmation {
                signature: signature_for("order_other", &payment_id),
                order_id: "order_other".to_string(),
                payment_id,
            }),
            Script::Cancel => Err(CheckoutError::Cancelled),
            Script::Fail(reason) => Err(CheckoutError::ProviderFailure(reason)),
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

type Shared = State<Arc<MockState>>;

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/profile", get(profile).put(update_profile))
        .route("/api/subscription/status", get(subscription_status))
        .route("/api/subscription/create-order", post(create_order))
        .route("/api/subscription/verify", post(verify))
        .route("/api/subscription/history", get(subscription_history))
        .route("/api/meals/analyze", post(analyze))
        .route("/api/meals/{id}", delete(delete_meal))
        .route("/api/dashboard/today", get(today))
        .route("/api/dashboard/history", get(history))
        .route("/api/dashboard/stats", get(stats))
        .route("/api/dashboard/meals", get(meals))
        .route("/api/health", get(health))
        .with_state(state)
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Record the header, apply injected failures, and resolve the user.
fn authorize(state: &MockState, headers: &HeaderMap, path: &str) -> Result<String, Response> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let mut data = state.data();
    data.auth_log.push(AuthRecord {
        path: path.to_string(),
        authorization: authorization.clone(),
    });

    let email = authorization
        .as_deref()
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| data.tokens.get(token))
        .cloned()
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Invalid token"))?;

    if let Some((status, body)) = data.failures.get(path) {
        return Err((*status, Json(body.clone())).into_response());
    }
    Ok(email)
}

fn issue_token(data: &mut MockData, email: &str) -> String {
    data.next_id += 1;
    let token = format!("token-{}-{}", email, data.next_id);
    data.tokens.insert(token.clone(), email.to_string());
    token
}

fn scans_used(data: &MockData, email: &str) -> u32 {
    let count = data.meals.iter().filter(|(owner, _)| owner == email).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn status_for(data: &MockData, email: &str) -> Value {
    let paid = data.users.get(email).is_some_and(|u| u.paid);
    let mut status = if paid {
        json!({ "active": true, "expires_at": "2026-06-03T10:00:00", "plan": PLAN_NAME })
    } else {
        let used = scans_used(data, email);
        json!({
            "active": used < FREE_SCANS,
            "free_scans_used": used,
            "free_scans_total": FREE_SCANS,
            "is_trial": true,
        })
    };
    if let Some(object) = status.as_object_mut() {
        object.insert("plan_name".to_string(), json!(PLAN_NAME));
        object.insert("plan_amount".to_string(), json!(300.0));
        object.insert("plan_duration_days".to_string(), json!(90));
        object.insert("razorpay_key_id".to_string(), json!("rzp_test_key"));
    }
    status
}

async fn register(State(state): Shared, Json(body): Json<Value>) -> Response {
    let field = |name: &str| body.get(name).and_then(Value::as_str).map(String::from);
    let (Some(email), Some(password), Some(name)) =
        (field("email"), field("password"), field("name"))
    else {
        let missing: Vec<Value> = ["email", "password", "name"]
            .into_iter()
            .filter(|name| field(name).is_none())
            .map(|name| json!({ "loc": ["body", name], "msg": "field required" }))
            .collect();
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": missing })))
            .into_response();
    };

    let mut data = state.data();
    if data.users.contains_key(&email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let profile = body.as_object().cloned().unwrap_or_default();
    data.users.insert(
        email.clone(),
        User {
            password,
            name,
            profile,
            ..User::default()
        },
    );
    let token = issue_token(&mut data, &email);
    Json(json!({ "token": token, "message": "Registration successful" })).into_response()
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

    let mut data = state.data();
    let Some(name) = data
        .users
        .get(email)
        .filter(|user| user.password == password)
        .map(|user| user.name.clone())
    else {
        return detail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    let token = issue_token(&mut data, email);
    Json(json!({ "token": token, "name": name })).into_response()
}

async fn profile(State(state): Shared, headers: HeaderMap) -> Response {
    let email = match authorize(&state, &headers, "/profile") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let data = state.data();
    let Some(user) = data.users.get(&email) else {
        return detail(StatusCode::NOT_FOUND, "User not found");
    };
    let mut profile = user.profile.clone();
    profile.remove("password");
    profile.insert("name".to_string(), json!(user.name));
    profile.insert("email".to_string(), json!(email));
    profile.insert("current_day".to_string(), json!(CURRENT_DAY));
    profile.insert("member_since".to_string(), json!("2026-03-03 08:00:00"));
    Json(Value::Object(profile)).into_response()
}

async fn update_profile(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let email = match authorize(&state, &headers, "/profile") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let mut data = state.data();
    if let (Some(user), Some(update)) = (data.users.get_mut(&email), body.as_object()) {
        for (key, value) in update {
            if key == "name" {
                user.name = value.as_str().unwrap_or_default().to_string();
            } else {
                user.profile.insert(key.clone(), value.clone());
            }
        }
    }
    Json(json!({ "message": "Profile updated" })).into_response()
}

async fn subscription_status(State(state): Shared, headers: HeaderMap) -> Response {
    let email = match authorize(&state, &headers, "/subscription/status") {
        Ok(email) => email,
        Err(response) => return response,
    };
    Json(status_for(&state.data(), &email)).into_response()
}

async fn create_order(State(state): Shared, headers: HeaderMap) -> Response {
    let email = match authorize(&state, &headers, "/subscription/create-order") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let order_id = format!("order_{}", state.next_id());
    let mut data = state.data();
    data.orders.insert(order_id.clone(), email.clone());
    let name = data.users.get(&email).map(|u| u.name.clone());
    Json(json!({
        "order_id": order_id,
        "amount": PLAN_AMOUNT_PAISE,
        "currency": "INR",
        "key_id": "rzp_test_key",
        "name": "NutriScan",
        "description": PLAN_NAME,
        "prefill": { "name": name, "email": email },
    }))
    .into_response()
}

async fn verify(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let email = match authorize(&state, &headers, "/subscription/verify") {
        Ok(email) => email,
        Err(response) => return response,
    };
    state.verify_calls.fetch_add(1, Ordering::SeqCst);

    let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or_default();
    let order_id = field("razorpay_order_id");
    let payment_id = field("razorpay_payment_id");
    let signature = field("razorpay_signature");

    let mut data = state.data();
    let owned = data.orders.get(order_id) == Some(&email);
    if !owned || signature != signature_for(order_id, payment_id) {
        return detail(StatusCode::BAD_REQUEST, "Payment verification failed");
    }
    if let Some(user) = data.users.get_mut(&email) {
        user.paid = true;
        let already = user
            .subscriptions
            .iter()
            .any(|s| s.get("order_id").and_then(Value::as_str) == Some(order_id));
        if !already {
            let id = user.subscriptions.len() + 1;
            user.subscriptions.push(json!({
                "id": id,
                "order_id": order_id,
                "amount_paise": PLAN_AMOUNT_PAISE,
                "status": "paid",
                "starts_at": "2026-03-05T10:00:00",
                "expires_at": "2026-06-03T10:00:00",
                "created_at": "2026-03-05 10:00:00",
            }));
        }
    }
    Json(json!({
        "status": "active",
        "message": "Payment successful! Subscription activated.",
        "starts_at": "2026-03-05T10:00:00",
        "expires_at": "2026-06-03T10:00:00",
    }))
    .into_response()
}

async fn subscription_history(State(state): Shared, headers: HeaderMap) -> Response {
    let email = match authorize(&state, &headers, "/subscription/history") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let data = state.data();
    let subscriptions = data
        .users
        .get(&email)
        .map(|u| u.subscriptions.clone())
        .unwrap_or_default();
    Json(json!({ "subscriptions": subscriptions })).into_response()
}

async fn analyze(State(state): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let email = match authorize(&state, &headers, "/meals/analyze") {
        Ok(email) => email,
        Err(response) => return response,
    };
    state.analyze_calls.fetch_add(1, Ordering::SeqCst);

    if status_for(&state.data(), &email).get("active") != Some(&json!(true)) {
        return detail(StatusCode::PAYMENT_REQUIRED, "subscription_required");
    }

    let mut photo_len = 0;
    let mut meal_type = "lunch".to_string();
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("photo") => photo_len = field.bytes().await.map_or(0, |b| b.len()),
            Some("meal_type") => meal_type = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }
    if photo_len == 0 {
        return detail(StatusCode::BAD_REQUEST, "Empty photo");
    }

    let id = state.next_id();
    let mut data = state.data();
    let meal_number = scans_used(&data, &email) + 1;
    data.meals.push((
        email,
        json!({
            "id": id,
            "day_number": CURRENT_DAY,
            "meal_number": meal_number,
            "meal_type": meal_type,
            "meal_name": "Idli sambar",
            "total_calories": 350.0,
            "total_weight_g": 300.0,
            "protein_g": 12.0,
            "carbs_g": 60.0,
            "fat_g": 6.0,
            "fiber_g": 5.0,
            "glycemic_impact": "moderate",
            "healthiness_score": 7.0,
            "logged_at": "2026-03-05 08:30:00",
        }),
    ));

    Json(json!({
        "meal_id": id,
        "day_number": CURRENT_DAY,
        "meal_number": meal_number,
        "meal_type": meal_type,
        "meal_format": "South Indian breakfast plate",
        "meal_name": "Idli sambar",
        "confidence": "high",
        "total_calories": 350,
        "total_weight_g": 300,
        "macros": { "protein_g": 12, "carbs_g": 60, "fat_g": 6, "fiber_g": 5 },
        "sugar_spike": {
            "glycemic_impact": "moderate",
            "estimated_peak_mg_dl": 140,
            "time_to_peak_minutes": 40,
            "explanation": "Fermented rice batter"
        },
        "insulin_resistance": { "risk": "low", "explanation": "Balanced with lentils" },
        "items": [
            { "name": "Idli", "portion": "3 pieces", "weight_g": 150, "calories": 200 },
            { "name": "Sambar", "portion": "1 bowl", "weight_g": 150, "calories": 150 }
        ],
        "micronutrients": { "notable": ["iron"], "lacking": ["vitamin C"] },
        "health_notes": "Good breakfast",
        "healthiness_score": 7,
        "recommendations": "Add a fruit"
    }))
    .into_response()
}

async fn delete_meal(State(state): Shared, headers: HeaderMap, UrlPath(id): UrlPath<i64>) -> Response {
    let path = format!("/meals/{id}");
    let email = match authorize(&state, &headers, &path) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let mut data = state.data();
    let before = data.meals.len();
    data.meals
        .retain(|(owner, meal)| !(owner == &email && meal.get("id") == Some(&json!(id))));
    if data.meals.len() == before {
        return detail(StatusCode::NOT_FOUND, "Meal not found");
    }
    Json(json!({ "message": "Meal deleted", "meal_id": id })).into_response()
}

fn user_meals(data: &MockData, email: &str) -> Vec<Value> {
    data.meals
        .iter()
        .filter(|(owner, _)| owner == email)
        .map(|(_, meal)| meal.clone())
        .collect()
}

fn summary(meals: &[Value]) -> Option<Value> {
    if meals.is_empty() {
        return None;
    }
    let total = |key: &str| -> f64 { meals.iter().filter_map(|m| m.get(key)?.as_f64()).sum() };
    #[allow(clippy::cast_precision_loss)]
    let count = meals.len() as f64;
    Some(json!({
        "day_number": CURRENT_DAY,
        "date": TODAY,
        "total_calories": total("total_calories"),
        "total_weight_g": total("total_weight_g"),
        "total_protein_g": total("protein_g"),
        "total_carbs_g": total("carbs_g"),
        "total_fat_g": total("fat_g"),
        "total_fiber_g": total("fiber_g"),
        "meal_count": meals.len(),
        "avg_healthiness": total("healthiness_score") / count,
        "high_sugar_meals": 0,
        "high_insulin_risk_meals": 0,
    }))
}

async fn today(State(state): Shared, headers: HeaderMap) -> Response {
    let email = match authorize(&state, &headers, "/dashboard/today") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let meals = user_meals(&state.data(), &email);
    Json(json!({
        "day_number": CURRENT_DAY,
        "date": TODAY,
        "calorie_target": 1800,
        "summary": summary(&meals),
        "meals": meals,
    }))
    .into_response()
}

async fn history(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let email = match authorize(&state, &headers, "/dashboard/history") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let days: u32 = query.get("days").and_then(|d| d.parse().ok()).unwrap_or(7);
    let meals = user_meals(&state.data(), &email);
    let summaries: Vec<Value> = if days == 0 {
        Vec::new()
    } else {
        summary(&meals).into_iter().collect()
    };
    Json(json!({ "current_day": CURRENT_DAY, "days": summaries, "calorie_target": 1800 }))
        .into_response()
}

async fn stats(State(state): Shared, headers: HeaderMap) -> Response {
    // The token is resolved after the delay, so a revoke during it answers 401.
    let delay = state.data().stats_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let email = match authorize(&state, &headers, "/dashboard/stats") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let meals = user_meals(&state.data(), &email);
    let summary = summary(&meals);
    let avg = |key: &str| {
        summary
            .as_ref()
            .and_then(|s| s.get(key)?.as_f64())
            .map(|total| {
                #[allow(clippy::cast_precision_loss)]
                let count = meals.len() as f64;
                total / count
            })
    };
    Json(json!({
        "current_day": CURRENT_DAY,
        "member_since": "2026-03-03 08:00:00",
        "total_meals": meals.len(),
        "avg_calories": avg("total_calories"),
        "avg_weight_g": avg("total_weight_g"),
        "avg_healthiness": summary.as_ref().and_then(|s| s.get("avg_healthiness").cloned()),
        "high_sugar_meals": summary.as_ref().map(|_| 0),
        "high_insulin_meals": summary.as_ref().map(|_| 0),
        "avg_protein": avg("total_protein_g"),
        "avg_carbs": avg("total_carbs_g"),
        "avg_fat": avg("total_fat_g"),
    }))
    .into_response()
}

async fn meals(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let email = match authorize(&state, &headers, "/dashboard/meals") {
        Ok(email) => email,
        Err(response) => return response,
    };
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<usize>().ok());
    let limit = number("limit").unwrap_or(20);
    let offset = number("offset").unwrap_or(0);
    let day = number("day");

    let meals: Vec<Value> = user_meals(&state.data(), &email)
        .into_iter()
        .filter(|meal| {
            day.is_none_or(|day| {
                meal.get("day_number").and_then(Value::as_u64) == u64::try_from(day).ok()
            })
        })
        .skip(offset)
        .take(limit)
        .collect();
    Json(json!({ "meals": meals })).into_response()
}

async fn health(State(state): Shared, headers: HeaderMap) -> Response {
    state.health_calls.fetch_add(1, Ordering::SeqCst);
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.data().auth_log.push(AuthRecord {
        path: "/health".to_string(),
        authorization,
    });
    let failure = state.data().failures.get("/health").cloned();
    if let Some((status, body)) = failure {
        return (status, Json(body)).into_response();
    }
    Json(json!({ "status": "ok", "version": "1.0.0" })).into_response()
}
