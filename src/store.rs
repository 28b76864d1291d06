//! Storage contracts and the built-in token store backends.
//!
//! Every backend honors the same read contract: an absent, malformed, tampered, or
//! owner-mismatched record is reported as `Ok(None)` after the specific reason is logged through
//! [`obs::record_discard`]. Only genuine backend failures (I/O, connectivity) surface as
//! [`StoreError`].

pub mod cookie;
pub mod memory;
pub mod sql;

pub use cookie::CookieStore;
pub use memory::MemoryStore;
pub use sql::SqlStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	cookie::{ChunkedCookieCodec, SharedCookieJar},
	crypto::CryptoEngine,
	obs,
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for a user's current token record.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record owned by `record.user_id`.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record owned by `user_id`, if a usable one exists.
	fn read<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Removes the record owned by `user_id`. Clearing an absent record succeeds.
	fn clear<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The record could not be encoded for storage.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Storage strategy chosen once at startup.
///
/// The cookie strategy is request-scoped, so callers obtain a [`TokenStore`] per request via
/// [`StoreBackend::bind`].
#[derive(Clone, Debug)]
pub enum StoreBackend {
	/// Encrypted record carried in the client's cookies.
	Cookie {
		/// Envelope sealer.
		crypto: Arc<CryptoEngine>,
		/// Cookie layout and attributes.
		codec: Arc<ChunkedCookieCodec>,
	},
	/// Durable row keyed by user + provider.
	Sql(SqlStore),
	/// In-process map for tests and demos.
	Memory(Arc<MemoryStore>),
}
impl StoreBackend {
	/// Stable label for logs and metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Cookie { .. } => cookie::BACKEND,
			Self::Sql(_) => sql::BACKEND,
			Self::Memory(_) => memory::BACKEND,
		}
	}

	/// Returns the store serving one request; `jar` is only used by the cookie strategy.
	pub fn bind(&self, jar: SharedCookieJar) -> Arc<dyn TokenStore> {
		match self {
			Self::Cookie { crypto, codec } =>
				Arc::new(CookieStore::new(crypto.clone(), codec.clone(), jar)),
			Self::Sql(store) => Arc::new(store.clone()),
			Self::Memory(store) => store.clone(),
		}
	}
}

/// Applies the owner check shared by every backend.
pub(crate) fn owned_by(
	backend: &'static str,
	record: TokenRecord,
	user_id: &UserId,
) -> Option<TokenRecord> {
	if &record.user_id == user_id {
		Some(record)
	} else {
		obs::record_discard(backend, "owner_mismatch");

		None
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, auth::EncryptionSecret};

	#[test]
	fn owner_check_rejects_foreign_records() {
		let now = OffsetDateTime::now_utc();
		let record = record_fixture(&user("u1"), "a", None, now, Duration::hours(1));

		assert!(owned_by("memory", record.clone(), &user("u1")).is_some());
		assert!(owned_by("memory", record, &user("u2")).is_none());
	}

	#[test]
	fn backend_kinds_are_stable() {
		let cookie = StoreBackend::Cookie {
			crypto: Arc::new(CryptoEngine::new(&EncryptionSecret::new("k"))),
			codec: Arc::new(ChunkedCookieCodec::default()),
		};

		assert_eq!(cookie.kind(), "cookie");
		assert_eq!(StoreBackend::Memory(Arc::default()).kind(), "memory");
	}
}
