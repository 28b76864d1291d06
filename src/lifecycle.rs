//! Token lifecycle manager: hands out fresh access tokens and refreshes them proactively.
//!
//! [`TokenManager::get_valid_token`] reads the caller's record and returns its access token while
//! it is outside the refresh threshold. Inside the threshold (or past expiry) it runs the refresh
//! exchange when a usable refresh token exists. Every failure collapses to `None` for the caller
//! and is logged with its specific kind; a failed refresh never clears the stored record.

mod metrics;
mod refresh;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Freshness, TokenRecord, TokenSecret, UserId},
	discovery::DiscoveryCache,
	error::TokenKind,
	http::ReqwestHttpClient,
	obs::{self, FlowKind},
	store::TokenStore,
};

/// Lookahead window applied when no threshold is configured.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::minutes(5);

/// OAuth client credentials sent with every refresh request.
#[derive(Clone)]
pub struct ClientCredentials {
	client_id: String,
	client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates credentials from the registered client ID and secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Registered client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	pub(crate) fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

/// What an external logout flow needs after the local record is gone.
#[derive(Clone, Debug, Default)]
pub struct SignOut {
	/// ID token to pass as `id_token_hint`, if one was stored.
	pub id_token: Option<TokenSecret>,
	/// Provider end-session endpoint, if discovery advertises one.
	pub end_session_endpoint: Option<Url>,
}

/// Resolves valid access tokens for users, refreshing through the provider when needed.
///
/// Cheap to clone; clones share the discovery cache, credentials, and refresh counters.
#[derive(Clone)]
pub struct TokenManager {
	store: Arc<dyn TokenStore>,
	discovery: Arc<DiscoveryCache>,
	http: ReqwestHttpClient,
	credentials: Arc<ClientCredentials>,
	refresh_threshold: Duration,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl TokenManager {
	/// Creates a manager with the default five-minute refresh threshold.
	pub fn new(
		store: Arc<dyn TokenStore>,
		discovery: Arc<DiscoveryCache>,
		http: ReqwestHttpClient,
		credentials: ClientCredentials,
	) -> Self {
		Self {
			store,
			discovery,
			http,
			credentials: Arc::new(credentials),
			refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
			refresh_metrics: Default::default(),
		}
	}

	/// Overrides the lookahead window; negative values are treated as zero.
	pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold.max(Duration::ZERO);

		self
	}

	/// Shares refresh counters with other managers.
	pub fn with_refresh_metrics(mut self, metrics: Arc<RefreshMetrics>) -> Self {
		self.refresh_metrics = metrics;

		self
	}

	/// Lookahead window in effect.
	pub fn refresh_threshold(&self) -> Duration {
		self.refresh_threshold
	}

	/// Refresh counters for this manager.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		&self.refresh_metrics
	}

	/// Store this manager reads from and writes to.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Returns a usable access token for `user_id`, or `None` when re-authentication is needed.
	pub async fn get_valid_token(&self, user_id: &UserId) -> Option<TokenSecret> {
		self.get_valid_token_at(user_id, OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenManager::get_valid_token`], evaluated at `now`.
	pub async fn get_valid_token_at(
		&self,
		user_id: &UserId,
		now: OffsetDateTime,
	) -> Option<TokenSecret> {
		match self.resolve_at(user_id, now).await {
			Ok(record) => Some(record.access_token),
			Err(Error::MissingToken) => None,
			Err(e) => {
				obs::warn_flow_failure(FlowKind::Refresh, "get_valid_token", &e);

				None
			},
		}
	}

	/// Resolves the caller's current record, refreshing it when it falls inside the threshold.
	///
	/// Unlike [`TokenManager::get_valid_token_at`], this reports why no token is available.
	pub async fn resolve_at(&self, user_id: &UserId, now: OffsetDateTime) -> Result<TokenRecord> {
		let record = self.store.read(user_id).await?.ok_or(Error::MissingToken)?;

		if &record.user_id != user_id {
			return Err(Error::UserMismatch);
		}
		if record.freshness_at(now, self.refresh_threshold) == Freshness::Fresh {
			return Ok(record);
		}
		if record.usable_refresh_token_at(now).is_none() {
			let token =
				if record.refresh_token.is_some() { TokenKind::Refresh } else { TokenKind::Access };

			return Err(Error::Expired { token });
		}

		self.refresh_at(record, now).await
	}

	/// Clears the caller's record and returns what a provider logout needs.
	pub async fn sign_out(&self, user_id: &UserId) -> Result<SignOut> {
		let id_token = match self.store.read(user_id).await {
			Ok(record) => record.and_then(|record| record.id_token),
			Err(e) => {
				obs::warn_flow_failure(FlowKind::Refresh, "sign_out", &Error::from(e));

				None
			},
		};

		self.store.clear(user_id).await?;

		let end_session_endpoint =
			self.discovery.get().await.and_then(|info| info.end_session_endpoint.clone());

		Ok(SignOut { id_token, end_session_endpoint })
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("discovery", &self.discovery.url().as_str())
			.field("credentials", &self.credentials)
			.field("refresh_threshold", &self.refresh_threshold)
			.finish_non_exhaustive()
	}
}
