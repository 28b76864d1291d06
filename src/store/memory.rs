//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	store::{StoreFuture, TokenStore},
};

pub(crate) const BACKEND: &str = "memory";

type StoreMap = Arc<RwLock<HashMap<UserId, TokenRecord>>>;

/// Storage backend that keeps one record per user in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, record: TokenRecord) {
		map.write().insert(record.user_id.clone(), record);
	}

	fn read_now(map: StoreMap, user_id: UserId) -> Option<TokenRecord> {
		map.read().get(&user_id).cloned()
	}

	fn clear_now(map: StoreMap, user_id: UserId) {
		map.write().remove(&user_id);
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::save_now(map, record);

			Ok(())
		})
	}

	fn read<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();
		let user_id = user_id.to_owned();

		Box::pin(async move { Ok(Self::read_now(map, user_id)) })
	}

	fn clear<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let user_id = user_id.to_owned();

		Box::pin(async move {
			Self::clear_now(map, user_id);

			Ok(())
		})
	}
}
