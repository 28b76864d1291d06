//! Keeper-level error types shared across stores, the lifecycle manager, and configuration.

// self
use crate::_prelude::*;

/// Keeper-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which credential in a [`TokenRecord`](crate::auth::TokenRecord) a failure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// The short-lived access token.
	Access,
	/// The refresh token used to mint new access tokens.
	Refresh,
}
impl TokenKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access",
			TokenKind::Refresh => "refresh",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical keeper error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Encrypted envelope could not be opened.
	#[error(transparent)]
	Crypto(#[from] crate::crypto::CryptoError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No token record exists for the caller.
	#[error("No token record is stored for this user.")]
	MissingToken,
	/// Stored record belongs to a different user than the caller.
	#[error("Stored token record belongs to a different user.")]
	UserMismatch,
	/// The named credential is past its deadline.
	#[error("The {token} token has expired.")]
	Expired {
		/// Which credential expired.
		token: TokenKind,
	},
	/// Discovery did not yield a token endpoint.
	#[error("Provider discovery did not yield a token endpoint.")]
	EndpointUnavailable,
	/// Discovery document request returned a non-success status.
	#[error("Provider discovery request failed with status {status}.")]
	DiscoveryFailed {
		/// HTTP status code returned by the discovery endpoint.
		status: u16,
	},
	/// Provider rejected the refresh request.
	#[error("Provider rejected the refresh request: {reason}.")]
	RefreshFailed {
		/// HTTP status code returned by the token endpoint.
		status: Option<u16>,
		/// Provider-supplied error code or a status summary.
		reason: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider answered with a body that does not match the expected JSON shape.
	#[error("Provider returned a malformed {endpoint} response.")]
	MalformedResponse {
		/// Which provider endpoint answered.
		endpoint: &'static str,
		/// JSON path where parsing or validation failed.
		path: String,
	},
}
impl Error {
	/// Returns a stable label for the error kind, safe to log.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Storage(_) => "storage",
			Self::Config(_) => "config",
			Self::Crypto(e) => e.kind(),
			Self::Transport(_) => "network",
			Self::MissingToken => "missing_token",
			Self::UserMismatch => "user_mismatch",
			Self::Expired { .. } => "expired",
			Self::EndpointUnavailable => "endpoint_unavailable",
			Self::DiscoveryFailed { .. } => "discovery_failed",
			Self::RefreshFailed { .. } => "refresh_failed",
			Self::MalformedResponse { .. } => "malformed_response",
		}
	}
}

/// Configuration failures detected while booting the keeper.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting was not supplied.
	#[error("Required setting `{name}` is missing.")]
	MissingSetting {
		/// Setting or environment variable name.
		name: &'static str,
	},
	/// A URL-valued setting could not be parsed.
	#[error("Setting `{name}` is not a valid URL.")]
	InvalidUrl {
		/// Setting or environment variable name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A numeric or boolean setting could not be parsed.
	#[error("Setting `{name}` has an invalid value: {value}.")]
	InvalidValue {
		/// Setting or environment variable name.
		name: &'static str,
		/// Offending raw value.
		value: String,
	},
	/// The encryption secret is empty.
	#[error("The token encryption secret must not be empty.")]
	WeakSecret,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Durable storage could not be reached or prepared.
	#[error("Durable token storage could not be initialized: {message}.")]
	Database {
		/// Human-readable error payload.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Which provider endpoint was being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{crypto::CryptoError, store::StoreError};

	#[test]
	fn kinds_are_stable_labels() {
		assert_eq!(Error::from(CryptoError::Tamper).kind(), "tamper");
		assert_eq!(Error::EndpointUnavailable.kind(), "endpoint_unavailable");
		assert_eq!(Error::Expired { token: TokenKind::Refresh }.kind(), "expired");
		assert_eq!(
			Error::from(StoreError::Backend { message: "down".into() }).kind(),
			"storage"
		);
	}

	#[test]
	fn expired_message_names_the_token() {
		let err = Error::Expired { token: TokenKind::Refresh };

		assert_eq!(err.to_string(), "The refresh token has expired.");
	}

	#[test]
	fn store_error_is_exposed_as_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("database unreachable"));

		let source =
			StdError::source(&err).expect("Keeper error should expose the store error as source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
