//! Stateless [`TokenStore`] that keeps the encrypted record in the client's cookies.
//!
//! Each instance is bound to one request's [`SharedCookieJar`]. Writes go through the jar so the
//! request handler can emit `jar.delta()` as `Set-Cookie` headers. A cookie that fails to open
//! (bad format, failed authentication, invalid payload) is cleared on the spot. Clearing on behalf
//! of a user leaves a readable record owned by someone else untouched.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	cookie::{ChunkedCookieCodec, SharedCookieJar},
	crypto::CryptoEngine,
	obs,
	store::{self, StoreError, StoreFuture, TokenStore},
};

pub(crate) const BACKEND: &str = "cookie";

/// Request-scoped cookie store.
#[derive(Clone, Debug)]
pub struct CookieStore {
	crypto: Arc<CryptoEngine>,
	codec: Arc<ChunkedCookieCodec>,
	jar: SharedCookieJar,
}
impl CookieStore {
	/// Binds the shared crypto engine and codec to one request's jar.
	pub fn new(
		crypto: Arc<CryptoEngine>,
		codec: Arc<ChunkedCookieCodec>,
		jar: SharedCookieJar,
	) -> Self {
		Self { crypto, codec, jar }
	}

	/// Jar this store reads from and writes to.
	pub fn jar(&self) -> &SharedCookieJar {
		&self.jar
	}

	fn save_now(&self, record: &TokenRecord) -> Result<(), StoreError> {
		let envelope = self
			.crypto
			.encrypt(record)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.codec.write_to(&mut self.jar.lock(), &envelope);

		Ok(())
	}

	fn read_now(&self, user_id: &UserId) -> Option<TokenRecord> {
		let mut jar = self.jar.lock();
		let envelope = self.codec.read(&jar)?;

		match self.crypto.decrypt(&envelope) {
			Ok(record) => store::owned_by(BACKEND, record, user_id),
			Err(e) => {
				obs::record_discard(BACKEND, e.kind());
				self.codec.clear_from(&mut jar);

				None
			},
		}
	}

	fn clear_now(&self, user_id: &UserId) {
		let mut jar = self.jar.lock();
		let foreign = self
			.codec
			.read(&jar)
			.and_then(|envelope| self.crypto.decrypt(&envelope).ok())
			.is_some_and(|record| &record.user_id != user_id);

		if !foreign {
			self.codec.clear_from(&mut jar);
		}
	}
}
impl TokenStore for CookieStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(&record) })
	}

	fn read<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.read_now(user_id)) })
	}

	fn clear<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.clear_now(user_id);

			Ok(())
		})
	}
}
