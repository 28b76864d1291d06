//! Process-wide wiring: one [`TokenKeeper`] per process, one manager per request.

// self
use crate::{
	_prelude::*,
	client::ClientFactory,
	config::KeeperConfig,
	cookie::{ChunkedCookieCodec, SharedCookieJar},
	crypto::CryptoEngine,
	discovery::DiscoveryCache,
	error::ConfigError,
	http::ReqwestHttpClient,
	lifecycle::{ClientCredentials, DEFAULT_REFRESH_THRESHOLD, RefreshMetrics, TokenManager},
	store::{SqlStore, StoreBackend},
};

/// Long-lived state shared by every request: the chosen store backend, the discovery cache,
/// client credentials, and refresh counters.
#[derive(Clone, Debug)]
pub struct TokenKeeper {
	backend: StoreBackend,
	discovery: Arc<DiscoveryCache>,
	http: ReqwestHttpClient,
	credentials: ClientCredentials,
	api_base_url: Url,
	refresh_threshold: Duration,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl TokenKeeper {
	/// Assembles a keeper from already-built parts.
	pub fn new(
		backend: StoreBackend,
		discovery: Arc<DiscoveryCache>,
		http: ReqwestHttpClient,
		credentials: ClientCredentials,
		api_base_url: Url,
	) -> Self {
		Self {
			backend,
			discovery,
			http,
			credentials,
			api_base_url,
			refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
			refresh_metrics: Default::default(),
		}
	}

	/// Validates `config`, selects the store backend, and prepares shared state.
	///
	/// A configured `database_url` selects the SQL store (connecting and creating its table);
	/// otherwise the cookie store is used. Both seal tokens with the encryption secret. Any failure
	/// here should abort startup.
	pub async fn from_config(config: &KeeperConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let http = ReqwestHttpClient::new()?;
		let mut discovery = DiscoveryCache::new(config.discovery_url()?, http.clone());

		if let Some(ttl) = config.discovery_ttl() {
			discovery = discovery.with_ttl(ttl);
		}

		let crypto = Arc::new(CryptoEngine::new(&config.encryption_secret));
		let backend = match &config.database_url {
			Some(database_url) => {
				let store =
					SqlStore::connect(database_url, config.provider_id()?, crypto).await?;

				store
					.migrate()
					.await
					.map_err(|e| ConfigError::Database { message: e.to_string() })?;

				StoreBackend::Sql(store)
			},
			None => StoreBackend::Cookie {
				crypto,
				codec: Arc::new(ChunkedCookieCodec::default().with_options(config.cookie_options())),
			},
		};
		let credentials =
			ClientCredentials::new(config.client_id.clone(), config.client_secret.expose());

		#[cfg(feature = "tracing")]
		tracing::info!(
			backend = backend.kind(),
			discovery = %discovery.url(),
			"Token keeper initialized."
		);

		Ok(Self::new(backend, Arc::new(discovery), http, credentials, config.api_base_url.clone())
			.with_refresh_threshold(config.refresh_threshold()))
	}

	/// Overrides the refresh lookahead for every manager this keeper creates.
	pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold;

		self
	}

	/// Store backend chosen at startup.
	pub fn backend(&self) -> &StoreBackend {
		&self.backend
	}

	/// Shared discovery cache.
	pub fn discovery(&self) -> &Arc<DiscoveryCache> {
		&self.discovery
	}

	/// Refresh counters aggregated across all managers.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		&self.refresh_metrics
	}

	/// Builds the lifecycle manager for one request. `jar` is only used by the cookie backend.
	pub fn manager(&self, jar: SharedCookieJar) -> TokenManager {
		TokenManager::new(
			self.backend.bind(jar),
			self.discovery.clone(),
			self.http.clone(),
			self.credentials.clone(),
		)
		.with_refresh_threshold(self.refresh_threshold)
		.with_refresh_metrics(self.refresh_metrics.clone())
	}

	/// Builds the API client factory for one request.
	pub fn client_factory(&self, jar: SharedCookieJar) -> ClientFactory {
		ClientFactory::new(self.manager(jar), self.api_base_url.clone())
	}
}
