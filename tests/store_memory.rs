// crates.io
use time::macros;
// self
use oidc_token_keeper::{
	_preludet::*,
	store::{MemoryStore, TokenStore},
};

#[tokio::test]
async fn save_read_and_clear_round_trip() {
	let store = MemoryStore::default();
	let now = macros::datetime!(2025-11-10 12:00 UTC);
	let record =
		record_fixture(&user("u1"), "access-1", Some("refresh-1"), now, Duration::hours(1));

	store.save(record.clone()).await.expect("Saving into the memory store should succeed.");

	let fetched = store
		.read(&user("u1"))
		.await
		.expect("Reading from the memory store should succeed.")
		.expect("Stored record should remain present.");

	assert_eq!(fetched, record);
	assert!(store.read(&user("u2")).await.expect("Reading should succeed.").is_none());

	store.clear(&user("u1")).await.expect("Clearing the memory store should succeed.");

	assert!(store.is_empty());
}

#[tokio::test]
async fn save_replaces_previous_record_for_the_same_user() {
	let store = MemoryStore::default();
	let now = macros::datetime!(2025-11-10 12:00 UTC);

	store
		.save(record_fixture(&user("u1"), "access-1", Some("refresh-1"), now, Duration::hours(1)))
		.await
		.expect("First save should succeed.");
	store
		.save(record_fixture(&user("u1"), "access-2", None, now, Duration::hours(2)))
		.await
		.expect("Second save should succeed.");
	store
		.save(record_fixture(&user("u2"), "access-3", None, now, Duration::hours(2)))
		.await
		.expect("Third save should succeed.");

	let fetched = store
		.read(&user("u1"))
		.await
		.expect("Reading from the memory store should succeed.")
		.expect("Replacement record should be present.");

	assert_eq!(fetched.access_token.expose(), "access-2");
	assert!(fetched.refresh_token.is_none());
	assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn clones_share_state() {
	let store = MemoryStore::default();
	let clone = store.clone();
	let now = OffsetDateTime::now_utc();

	clone
		.save(record_fixture(&user("u1"), "access-1", None, now, Duration::hours(1)))
		.await
		.expect("Saving through a clone should succeed.");

	assert_eq!(store.len(), 1);
}
