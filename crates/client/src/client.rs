//! Assembly of the client components.

use std::sync::Arc;

use tracing::info;

use crate::api::NutriScanApi;
use crate::cache::OfflineCache;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::RequestGateway;
use crate::session::SessionStore;
use crate::storage::{FileStore, KeyValueStore};
use crate::subscription::SubscriptionGate;

/// Fully wired NutriScan client.
///
/// The session, cache, gateway and gate are shared handles; cloning the
/// client clones the handles, not the state.
#[derive(Debug, Clone)]
pub struct NutriScanClient {
    config: Arc<ClientConfig>,
    api: NutriScanApi,
    gate: SubscriptionGate,
}

impl NutriScanClient {
    /// Build a client that persists its session under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or persisted
    /// state cannot be opened.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Self::http_client(&config)?;
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.session_path())?);
        Self::with_http(config, http, storage).await
    }

    /// Build a client over an existing HTTP client and session storage.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state cannot be opened.
    pub async fn with_http(
        config: ClientConfig,
        http: reqwest::Client,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ClientError> {
        let session = SessionStore::open(storage)?;
        let cache = OfflineCache::open(http.clone(), &config).await?;
        let gateway = RequestGateway::new(http, config.api_url.clone(), session, cache);
        let api = NutriScanApi::new(gateway);
        let gate = SubscriptionGate::new(api.clone());

        info!(
            api_url = %config.api_url,
            cache_version = %config.cache.version,
            signed_in = api.gateway().session().is_signed_in(),
            "NutriScan client ready"
        );

        Ok(Self {
            config: Arc::new(config),
            api,
            gate,
        })
    }

    /// HTTP client with the configured timeout boundary.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Build` if the TLS backend cannot be initialized.
    pub fn http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("nutriscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Build)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn api(&self) -> &NutriScanApi {
        &self.api
    }

    #[must_use]
    pub const fn gate(&self) -> &SubscriptionGate {
        &self.gate
    }

    #[must_use]
    pub const fn gateway(&self) -> &RequestGateway {
        self.api.gateway()
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.api.gateway().session()
    }

    #[must_use]
    pub fn cache(&self) -> &OfflineCache {
        self.api.gateway().cache()
    }
}
