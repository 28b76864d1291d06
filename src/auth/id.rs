//! Identifiers for session owners and identity providers.
//!
//! Both wrap the caller's string untouched and compare byte for byte, so `Alice` and `alice` are
//! different owners and no normalization ever merges two sessions. The one structural rule is that
//! an identifier is never empty: an empty owner would be indistinguishable from "no session".

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

/// Error returned when an identifier cannot be constructed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was the empty string.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Which identifier was rejected (`User`, `Provider`).
		kind: &'static str,
	},
}

macro_rules! opaque_id {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Wraps `value`, rejecting only the empty string.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				if value.is_empty() {
					return Err(IdentifierError::Empty { kind: $kind });
				}

				Ok(Self(value))
			}

			/// Identifier as received.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				self.0 == other
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", $kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

opaque_id! {
	/// Local session owner a token record belongs to.
	///
	/// Reads only return a record whose owner equals the caller's `UserId` exactly.
	UserId => "User"
}
opaque_id! {
	/// Upstream identity provider key (for example `keycloak`), part of the durable row key.
	ProviderId => "Provider"
}
