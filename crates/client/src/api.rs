//! Typed operations for every NutriScan endpoint.

use std::path::Path;

use nutriscan_core::{
    AuthResponse, Dashboard, DayNumber, DeleteMealResponse, HealthStatus, HistoryDashboard,
    LifetimeStats, LoginRequest, MealAnalysisResult, MealId, MealList, MealType, MessageResponse,
    OrderDescriptor, ProfileUpdate, ProviderConfirmation, RegisterRequest, SubscriptionHistory,
    SubscriptionStatus, TodayDashboard, UserProfile, VerifiedSubscription,
};
use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument};

use crate::error::ClientError;
use crate::gateway::{Body, Part, RequestGateway};
use crate::subscription::{Attempt, CheckoutWidget, SubscriptionGate};

/// Days of history the dashboard shows by default.
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

// =============================================================================
// Request helpers
// =============================================================================

/// Photo uploaded for analysis.
#[derive(Clone)]
pub struct MealPhoto {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MealPhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealPhoto")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl MealPhoto {
    /// Photo from bytes, with the MIME type guessed from `file_name`.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    /// Read a photo from disk.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Storage(e.into()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("meal.jpg");
        Ok(Self::new(file_name, bytes))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

/// Filters for `GET /dashboard/meals`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MealQuery {
    /// Only meals logged on this program day.
    pub day: Option<DayNumber>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MealQuery {
    fn path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(day) = self.day {
            query.append_pair("day", &day.get().to_string());
        }
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            query.append_pair("offset", &offset.to_string());
        }
        let query = query.finish();
        if query.is_empty() {
            "/dashboard/meals".to_string()
        } else {
            format!("/dashboard/meals?{query}")
        }
    }
}

// =============================================================================
// NutriScanApi
// =============================================================================

/// Typed client for the NutriScan service.
#[derive(Debug, Clone)]
pub struct NutriScanApi {
    gateway: RequestGateway,
}

impl NutriScanApi {
    #[must_use]
    pub const fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub const fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    // -------------------------------------------------------------------------
    // Account
    // -------------------------------------------------------------------------

    /// Create an account and sign the session in.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Request` with the server detail (e.g. an already
    /// registered email), or a storage error if the credential cannot be
    /// persisted.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let response: AuthResponse = self
            .gateway
            .send("/register", Method::POST, Some(Body::json(request)?))
            .await?;
        self.gateway.session().sign_in(response.token.clone())?;
        info!("Registered");
        Ok(response)
    }

    /// Log in and sign the session in.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AuthExpired` for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .gateway
            .send("/login", Method::POST, Some(Body::json(&request)?))
            .await?;
        self.gateway.session().sign_in(response.token.clone())?;
        info!("Logged in");
        Ok(response)
    }

    /// Forget the credential. The service keeps no server-side session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the persisted credential cannot be removed.
    pub fn logout(&self) -> Result<(), ClientError> {
        Ok(self.gateway.session().sign_out()?)
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        self.gateway.send("/profile", Method::GET, None).await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<MessageResponse, ClientError> {
        self.gateway
            .send("/profile", Method::PUT, Some(Body::json(update)?))
            .await
    }

    // -------------------------------------------------------------------------
    // Subscription
    // -------------------------------------------------------------------------

    /// Fresh entitlement snapshot. Never served from cache.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn subscription_status(&self) -> Result<SubscriptionStatus, ClientError> {
        self.gateway
            .send("/subscription/status", Method::GET, None)
            .await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn create_order(&self) -> Result<OrderDescriptor, ClientError> {
        self.gateway
            .send(
                "/subscription/create-order",
                Method::POST,
                Some(Body::Json(json!({}))),
            )
            .await
    }

    /// Submit a provider confirmation for server-side verification.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors; a bad signature is a `400` request error.
    #[instrument(skip_all, fields(order_id = %confirmation.order_id))]
    pub async fn verify_subscription(
        &self,
        confirmation: &ProviderConfirmation,
    ) -> Result<VerifiedSubscription, ClientError> {
        self.gateway
            .send(
                "/subscription/verify",
                Method::POST,
                Some(Body::json(confirmation)?),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn subscription_history(&self) -> Result<SubscriptionHistory, ClientError> {
        self.gateway
            .send("/subscription/history", Method::GET, None)
            .await
    }

    // -------------------------------------------------------------------------
    // Meals
    // -------------------------------------------------------------------------

    /// Upload a photo for analysis.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SubscriptionRequired` once the trial is used up
    /// and no subscription is active.
    #[instrument(skip(self, photo), fields(file_name = %photo.file_name, size = photo.bytes.len()))]
    pub async fn analyze_meal(
        &self,
        photo: &MealPhoto,
        meal_type: MealType,
    ) -> Result<MealAnalysisResult, ClientError> {
        let parts = vec![
            Part::file(
                "photo",
                photo.file_name.clone(),
                photo.mime.clone(),
                photo.bytes.clone(),
            ),
            Part::text("meal_type", meal_type.as_str()),
        ];
        let result: MealAnalysisResult = self
            .gateway
            .send("/meals/analyze", Method::POST, Some(Body::Multipart(parts)))
            .await?;
        info!(meal_id = %result.meal_id, calories = result.total_calories, "Meal analyzed");
        Ok(result)
    }

    /// Analyze a meal behind `gate`, paying through `widget` and retrying
    /// once if a subscription is required.
    ///
    /// # Errors
    ///
    /// Same as [`SubscriptionGate::attempt_with_payment`].
    pub async fn analyze_meal_gated<W: CheckoutWidget>(
        &self,
        gate: &SubscriptionGate,
        widget: &W,
        photo: &MealPhoto,
        meal_type: MealType,
    ) -> Result<Attempt<MealAnalysisResult>, ClientError> {
        gate.attempt_with_payment(widget, || self.analyze_meal(photo, meal_type))
            .await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn meals(&self, query: MealQuery) -> Result<MealList, ClientError> {
        self.gateway.send(&query.path(), Method::GET, None).await
    }

    /// # Errors
    ///
    /// Returns a `404` request error if the meal does not exist.
    #[instrument(skip(self))]
    pub async fn delete_meal(&self, id: MealId) -> Result<DeleteMealResponse, ClientError> {
        self.gateway
            .send(&format!("/meals/{id}"), Method::DELETE, None)
            .await
    }

    /// Delete a meal, then refetch every dashboard view.
    ///
    /// # Errors
    ///
    /// Fails if the delete or any of the refreshed views fails.
    pub async fn delete_meal_and_refresh(
        &self,
        id: MealId,
        days: u32,
    ) -> Result<Dashboard, ClientError> {
        self.delete_meal(id).await?;
        self.dashboard(days).await
    }

    // -------------------------------------------------------------------------
    // Dashboard
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn today(&self) -> Result<TodayDashboard, ClientError> {
        self.gateway.send("/dashboard/today", Method::GET, None).await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn history(&self, days: u32) -> Result<HistoryDashboard, ClientError> {
        self.gateway
            .send(&format!("/dashboard/history?days={days}"), Method::GET, None)
            .await
    }

    /// # Errors
    ///
    /// Propagates gateway errors.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<LifetimeStats, ClientError> {
        self.gateway.send("/dashboard/stats", Method::GET, None).await
    }

    /// Today, history and stats, fetched concurrently.
    ///
    /// # Errors
    ///
    /// The first failure fails the whole set.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, days: u32) -> Result<Dashboard, ClientError> {
        let (today, history, stats) =
            tokio::try_join!(self.today(), self.history(days), self.stats())?;
        Ok(Dashboard {
            today,
            history,
            stats,
        })
    }

    // -------------------------------------------------------------------------
    // Service
    // -------------------------------------------------------------------------

    /// Service liveness. Unauthenticated and answerable from the offline
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NetworkUnavailable` if the service is unreachable
    /// and no response was cached.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.gateway.fetch_public("/health").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_query_path() {
        assert_eq!(MealQuery::default().path(), "/dashboard/meals");
        let query = MealQuery {
            day: Some(DayNumber::new(3)),
            limit: Some(10),
            offset: None,
        };
        assert_eq!(query.path(), "/dashboard/meals?day=3&limit=10");
    }

    #[test]
    fn test_photo_mime_from_extension() {
        assert_eq!(MealPhoto::new("thali.PNG", vec![]).mime, "image/png");
        assert_eq!(MealPhoto::new("lunch.jpeg", vec![]).mime, "image/jpeg");
        assert_eq!(MealPhoto::new("no-extension", vec![]).mime, "image/jpeg");
    }

    #[test]
    fn test_photo_debug_omits_bytes() {
        let photo = MealPhoto::new("a.jpg", vec![0; 4]);
        assert_eq!(
            format!("{photo:?}"),
            r#"MealPhoto { file_name: "a.jpg", mime: "image/jpeg", len: 4 }"#
        );
    }

    #[tokio::test]
    async fn test_photo_from_missing_path() {
        let result = MealPhoto::from_path("/definitely/not/here.jpg").await;
        assert!(matches!(result, Err(ClientError::Storage(_))));
    }
}
