//! Keeper configuration loaded once at startup.
//!
//! Values come from the process environment ([`KeeperConfig::from_env`]), an arbitrary lookup
//! function ([`KeeperConfig::from_lookup`]), or any serde source. Every problem is reported as a
//! [`ConfigError`] so the host can abort boot instead of failing per request.

// self
use crate::{
	_prelude::*,
	auth::{EncryptionSecret, ProviderId, TokenSecret},
	cookie::CookieOptions,
	discovery,
	error::ConfigError,
	lifecycle::DEFAULT_REFRESH_THRESHOLD,
};

const DEFAULT_PROVIDER_ID: &str = "oidc";
const DEFAULT_COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Startup configuration for a [`TokenKeeper`](crate::keeper::TokenKeeper).
#[derive(Clone, Deserialize)]
pub struct KeeperConfig {
	/// Provider issuer URL (`OIDC_ISSUER`).
	pub issuer: Url,
	/// Explicit discovery document URL (`OIDC_DISCOVERY_URL`).
	#[serde(default)]
	pub discovery_url: Option<Url>,
	/// Provider key for durable rows (`OIDC_PROVIDER_ID`).
	#[serde(default = "default_provider_id")]
	pub provider_id: String,
	/// Registered client ID (`OIDC_CLIENT_ID`).
	pub client_id: String,
	/// Registered client secret (`OIDC_CLIENT_SECRET`).
	pub client_secret: TokenSecret,
	/// Secret keying the cookie envelope (`TOKEN_ENCRYPTION_SECRET`).
	pub encryption_secret: EncryptionSecret,
	/// Resource server base URL (`API_BASE_URL`).
	pub api_base_url: Url,
	/// Durable store connection string (`DATABASE_URL`); absent selects the cookie store.
	#[serde(default)]
	pub database_url: Option<String>,
	/// Refresh lookahead in seconds (`TOKEN_REFRESH_THRESHOLD_SECS`).
	#[serde(default = "default_refresh_threshold_secs")]
	pub refresh_threshold_secs: u64,
	/// `Secure` cookie attribute (`TOKEN_COOKIE_SECURE`).
	#[serde(default = "default_cookie_secure")]
	pub cookie_secure: bool,
	/// Cookie lifetime in seconds (`TOKEN_COOKIE_MAX_AGE_SECS`).
	#[serde(default = "default_cookie_max_age_secs")]
	pub cookie_max_age_secs: u64,
	/// Discovery cache TTL in seconds (`OIDC_DISCOVERY_TTL_SECS`); absent caches forever.
	#[serde(default)]
	pub discovery_ttl_secs: Option<u64>,
}
impl KeeperConfig {
	/// Loads and validates configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads and validates configuration from `lookup`, keyed by environment variable name.
	///
	/// Empty values count as unset.
	pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
	where
		F: FnMut(&str) -> Option<String>,
	{
		let mut get = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());
		let config = Self {
			issuer: parse_url("OIDC_ISSUER", required("OIDC_ISSUER", get("OIDC_ISSUER"))?)?,
			discovery_url: get("OIDC_DISCOVERY_URL")
				.map(|raw| parse_url("OIDC_DISCOVERY_URL", raw))
				.transpose()?,
			provider_id: get("OIDC_PROVIDER_ID").unwrap_or_else(default_provider_id),
			client_id: required("OIDC_CLIENT_ID", get("OIDC_CLIENT_ID"))?,
			client_secret: TokenSecret::new(required(
				"OIDC_CLIENT_SECRET",
				get("OIDC_CLIENT_SECRET"),
			)?),
			encryption_secret: EncryptionSecret::new(
				get("TOKEN_ENCRYPTION_SECRET").ok_or(ConfigError::WeakSecret)?,
			),
			api_base_url: parse_url("API_BASE_URL", required("API_BASE_URL", get("API_BASE_URL"))?)?,
			database_url: get("DATABASE_URL"),
			refresh_threshold_secs: get("TOKEN_REFRESH_THRESHOLD_SECS")
				.map(|raw| parse_number("TOKEN_REFRESH_THRESHOLD_SECS", raw))
				.transpose()?
				.unwrap_or_else(default_refresh_threshold_secs),
			cookie_secure: get("TOKEN_COOKIE_SECURE")
				.map(|raw| parse_bool("TOKEN_COOKIE_SECURE", raw))
				.transpose()?
				.unwrap_or_else(default_cookie_secure),
			cookie_max_age_secs: get("TOKEN_COOKIE_MAX_AGE_SECS")
				.map(|raw| parse_number("TOKEN_COOKIE_MAX_AGE_SECS", raw))
				.transpose()?
				.unwrap_or_else(default_cookie_max_age_secs),
			discovery_ttl_secs: get("OIDC_DISCOVERY_TTL_SECS")
				.map(|raw| parse_number("OIDC_DISCOVERY_TTL_SECS", raw))
				.transpose()?,
		};

		config.validate()?;

		Ok(config)
	}

	/// Checks invariants that deserialization alone cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.encryption_secret.is_empty() {
			return Err(ConfigError::WeakSecret);
		}
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingSetting { name: "OIDC_CLIENT_ID" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingSetting { name: "OIDC_CLIENT_SECRET" });
		}

		for (name, url) in [("OIDC_ISSUER", &self.issuer), ("API_BASE_URL", &self.api_base_url)] {
			if !matches!(url.scheme(), "http" | "https") {
				return Err(ConfigError::InvalidValue { name, value: url.scheme().to_owned() });
			}
		}

		self.provider_id()?;

		Ok(())
	}

	/// Validated provider key.
	pub fn provider_id(&self) -> Result<ProviderId, ConfigError> {
		ProviderId::new(&self.provider_id).map_err(|_| ConfigError::InvalidValue {
			name: "OIDC_PROVIDER_ID",
			value: self.provider_id.clone(),
		})
	}

	/// Discovery URL, derived from the issuer unless set explicitly.
	pub fn discovery_url(&self) -> Result<Url, ConfigError> {
		match &self.discovery_url {
			Some(url) => Ok(url.clone()),
			None => discovery::well_known_url(&self.issuer),
		}
	}

	/// Refresh lookahead window.
	pub fn refresh_threshold(&self) -> Duration {
		i64::try_from(self.refresh_threshold_secs)
			.map(Duration::seconds)
			.unwrap_or(DEFAULT_REFRESH_THRESHOLD)
	}

	/// Discovery cache TTL, if any.
	pub fn discovery_ttl(&self) -> Option<Duration> {
		self.discovery_ttl_secs.and_then(|secs| i64::try_from(secs).ok()).map(Duration::seconds)
	}

	/// Attributes for the token cookies.
	pub fn cookie_options(&self) -> CookieOptions {
		CookieOptions {
			secure: self.cookie_secure,
			max_age: i64::try_from(self.cookie_max_age_secs)
				.map(Duration::seconds)
				.unwrap_or(Duration::MAX),
			..Default::default()
		}
	}
}
impl Debug for KeeperConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeeperConfig")
			.field("issuer", &self.issuer.as_str())
			.field("discovery_url", &self.discovery_url.as_ref().map(Url::as_str))
			.field("provider_id", &self.provider_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("encryption_secret", &self.encryption_secret)
			.field("api_base_url", &self.api_base_url.as_str())
			.field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
			.field("refresh_threshold_secs", &self.refresh_threshold_secs)
			.field("cookie_secure", &self.cookie_secure)
			.field("cookie_max_age_secs", &self.cookie_max_age_secs)
			.field("discovery_ttl_secs", &self.discovery_ttl_secs)
			.finish()
	}
}

fn default_provider_id() -> String {
	DEFAULT_PROVIDER_ID.into()
}

fn default_refresh_threshold_secs() -> u64 {
	300
}

fn default_cookie_secure() -> bool {
	true
}

fn default_cookie_max_age_secs() -> u64 {
	DEFAULT_COOKIE_MAX_AGE_SECS
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
	value.ok_or(ConfigError::MissingSetting { name })
}

fn parse_url(name: &'static str, raw: String) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn parse_number(name: &'static str, raw: String) -> Result<u64, ConfigError> {
	raw.trim().parse().map_err(|_| ConfigError::InvalidValue { name, value: raw })
}

fn parse_bool(name: &'static str, raw: String) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidValue { name, value: raw }),
	}
}
