use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{SessionStore, StateSigner};
use crate::config::{AppConfig, ConfigError};
use crate::database::models::Provider;
use crate::database::{DatabaseError, DatabaseManager, IdentityStore};
use crate::providers::OAuthClient;
use crate::services::{
    AdsSyncService, Aggregator, ArchiveStore, AzureBlobStore, CredentialVerifier, DisabledArchiveStore,
    FacebookGraphClient, GraphApi, MemoryArchiveStore, PowerBiClient,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("HTTP client could not be built: {0}")]
    Http(#[from] reqwest::Error),
}

/// Everything a handler can reach. Built once from an explicit `AppConfig`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn IdentityStore>,
    pub sessions: Arc<SessionStore>,
    pub oauth_state: Arc<StateSigner>,
    pub oauth: OAuthClient,
    pub aggregator: Arc<Aggregator>,
    pub powerbi: PowerBiClient,
    pub ads: Arc<AdsSyncService>,
}

impl AppState {
    /// Validate `config`, open the identity store and pick an archive backend
    pub async fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        config.validate()?;
        let store = DatabaseManager::open(&config).await?;

        let http = Self::http_client(&config)?;
        let archive: Arc<dyn ArchiveStore> = match AzureBlobStore::from_config(http.clone(), &config.providers.archive) {
            Some(blob) => {
                info!("Archiving ad insights to blob container");
                Arc::new(blob)
            }
            None if config.is_development() => {
                warn!("ARCHIVE_CONTAINER_URL not set, archiving ad insights in memory");
                Arc::new(MemoryArchiveStore::new())
            }
            None => Arc::new(DisabledArchiveStore),
        };

        Ok(Self::assemble(config, store, archive, http))
    }

    /// Assemble state around an already opened store and archive
    pub fn new(
        config: AppConfig,
        store: Arc<dyn IdentityStore>,
        archive: Arc<dyn ArchiveStore>,
    ) -> Result<Self, StartupError> {
        let http = Self::http_client(&config)?;
        Ok(Self::assemble(config, store, archive, http))
    }

    /// Every provider client shares `http` and its connection pool
    fn assemble(
        config: AppConfig,
        store: Arc<dyn IdentityStore>,
        archive: Arc<dyn ArchiveStore>,
        http: reqwest::Client,
    ) -> Self {
        let providers = &config.providers;

        let graph: Arc<dyn GraphApi> = Arc::new(FacebookGraphClient::new(http.clone(), providers.facebook.graph_url.clone()));
        let aggregator = Aggregator::new(graph, providers.timeout(), providers.aggregate_post_limit);
        let ads = AdsSyncService::new(
            http.clone(),
            providers.facebook.graph_url.clone(),
            providers.ads.access_token.clone(),
            archive,
        );

        Self {
            sessions: Arc::new(SessionStore::from_config(&config.security)),
            oauth_state: Arc::new(StateSigner::new(
                &config.security.session_secret,
                Duration::seconds(config.security.oauth_state_ttl_secs),
            )),
            oauth: OAuthClient::new(http.clone(), providers.clone()),
            aggregator: Arc::new(aggregator),
            powerbi: PowerBiClient::new(http, providers.powerbi.clone()),
            ads: Arc::new(ads),
            store,
            config: Arc::new(config),
        }
    }

    /// Swap the Graph API backend used by the aggregator
    pub fn with_graph(mut self, graph: Arc<dyn GraphApi>) -> Self {
        let providers = &self.config.providers;
        self.aggregator = Arc::new(Aggregator::new(graph, providers.timeout(), providers.aggregate_post_limit));
        self
    }

    pub fn verifier(&self) -> CredentialVerifier {
        CredentialVerifier::new(self.store.clone())
    }

    /// Callback URL registered with the provider
    pub fn redirect_uri(&self, provider: Provider) -> String {
        format!("{}/auth/callback/{}", self.config.server.public_base_url, provider)
    }

    fn http_client(config: &AppConfig) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(config.providers.timeout())
            .user_agent(concat!("bi-dashboard-api/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}
