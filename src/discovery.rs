//! Process-wide memoization of the provider's discovery document.
//!
//! The first successful fetch is kept behind a read/write lock and shared by every caller.
//! Failures are never cached, so the next call retries. Concurrent first callers may each fetch;
//! the document is idempotent, so the last writer simply wins. An optional TTL bounds how long a
//! cached document is trusted.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::ReqwestHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Path appended to an issuer URL to locate its discovery document.
pub const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Endpoints extracted from the discovery document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
	/// Endpoint accepting refresh-token grants.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// Endpoint the logout flow redirects to.
	#[serde(default)]
	pub end_session_endpoint: Option<Url>,
}

#[derive(Debug)]
struct CachedDiscovery {
	info: Arc<DiscoveryInfo>,
	fetched_at: OffsetDateTime,
}

/// Lazily populated, shareable discovery cache.
#[derive(Debug)]
pub struct DiscoveryCache {
	url: Url,
	http: ReqwestHttpClient,
	ttl: Option<Duration>,
	slot: RwLock<Option<CachedDiscovery>>,
}
impl DiscoveryCache {
	/// Creates an empty cache that fetches `url` on first use.
	pub fn new(url: Url, http: ReqwestHttpClient) -> Self {
		Self { url, http, ttl: None, slot: RwLock::new(None) }
	}

	/// Creates a cache for the issuer's well-known discovery document.
	pub fn from_issuer(issuer: &Url, http: ReqwestHttpClient) -> Result<Self, ConfigError> {
		Ok(Self::new(well_known_url(issuer)?, http))
	}

	/// Refetches cached documents older than `ttl`.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);

		self
	}

	/// Discovery document location.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Returns the cached document without touching the network.
	pub fn peek(&self) -> Option<Arc<DiscoveryInfo>> {
		self.slot.read().as_ref().map(|cached| cached.info.clone())
	}

	/// Returns the discovery info, fetching it on first use. `None` on any failure.
	pub async fn get(&self) -> Option<Arc<DiscoveryInfo>> {
		self.get_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`DiscoveryCache::get`], evaluating the TTL against `now`.
	pub async fn get_at(&self, now: OffsetDateTime) -> Option<Arc<DiscoveryInfo>> {
		self.try_get_at(now).await.ok()
	}

	/// Returns the discovery info or the error that prevented fetching it.
	pub async fn try_get_at(&self, now: OffsetDateTime) -> Result<Arc<DiscoveryInfo>> {
		if let Some(info) = self.fresh_at(now) {
			return Ok(info);
		}

		const KIND: FlowKind = FlowKind::Discovery;

		let span = FlowSpan::new(KIND, "fetch_discovery");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch()).await;

		match result {
			Ok(info) => {
				let info = Arc::new(info);

				*self.slot.write() = Some(CachedDiscovery { info: info.clone(), fetched_at: now });

				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(info)
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::warn_flow_failure(KIND, "fetch_discovery", &e);

				Err(e)
			},
		}
	}

	fn fresh_at(&self, now: OffsetDateTime) -> Option<Arc<DiscoveryInfo>> {
		let guard = self.slot.read();
		let cached = guard.as_ref()?;

		match self.ttl {
			Some(ttl) if now - cached.fetched_at >= ttl => None,
			_ => Some(cached.info.clone()),
		}
	}

	async fn fetch(&self) -> Result<DiscoveryInfo> {
		let reply = self.http.get_json("discovery", &self.url).await?;

		if !reply.is_success() {
			return Err(Error::DiscoveryFailed { status: reply.metadata.status.unwrap_or_default() });
		}

		reply.parse("discovery")
	}
}

/// Builds `<issuer>/.well-known/openid-configuration`, keeping any issuer path prefix.
pub fn well_known_url(issuer: &Url) -> Result<Url, ConfigError> {
	let mut base = issuer.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(WELL_KNOWN_PATH)
		.map_err(|source| ConfigError::InvalidUrl { name: "OIDC_ISSUER", source })
}
