//! Redacting wrappers for token values and the operator-supplied encryption secret.

// self
use crate::_prelude::*;

/// Redacted token value wrapper keeping access, refresh, and ID tokens out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Operator-configured secret of arbitrary length that keys the cookie envelope.
///
/// The value is only ever fed into key derivation; it never appears in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct EncryptionSecret(String);
impl EncryptionSecret {
	/// Wraps the configured secret.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw secret bytes fed into key derivation.
	pub(crate) fn as_bytes(&self) -> &[u8] {
		self.0.as_bytes()
	}

	/// Returns `true` when no secret material was supplied.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Debug for EncryptionSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("EncryptionSecret(<redacted>)")
	}
}
