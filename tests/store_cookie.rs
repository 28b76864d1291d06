// self
use oidc_token_keeper::{
	_preludet::*,
	auth::{EncryptionSecret, TokenRecord, TokenSecret},
	cookie::{ChunkedCookieCodec, Cookie, CookieJar, SharedCookieJar},
	crypto::CryptoEngine,
	store::{CookieStore, TokenStore},
};

const SECRET: &str = "cookie-store-secret";

fn store_with(jar: CookieJar) -> CookieStore {
	CookieStore::new(
		Arc::new(CryptoEngine::new(&EncryptionSecret::new(SECRET))),
		Arc::new(ChunkedCookieCodec::default()),
		Arc::new(Mutex::new(jar)),
	)
}

fn record(user_id: &str) -> TokenRecord {
	record_fixture(
		&user(user_id),
		"access-1",
		Some("refresh-1"),
		OffsetDateTime::now_utc(),
		Duration::hours(1),
	)
}

// Simulates the browser echoing the current cookies back on the next request.
fn next_request(jar: &SharedCookieJar) -> CookieJar {
	let mut next = CookieJar::new();

	for cookie in jar.lock().iter() {
		next.add_original(Cookie::new(cookie.name().to_owned(), cookie.value().to_owned()));
	}

	next
}

fn cookie_names(jar: &CookieJar) -> Vec<String> {
	let mut names = jar.iter().map(|cookie| cookie.name().to_owned()).collect::<Vec<_>>();

	names.sort();

	names
}

#[tokio::test]
async fn saved_record_survives_the_next_request() {
	let first = store_with(CookieJar::new());
	let record = record("u1");

	first.save(record.clone()).await.expect("Saving into the cookie store should succeed.");

	assert!(first.jar().lock().delta().any(|cookie| cookie.name() == "oidc_token"));

	let second = store_with(next_request(first.jar()));
	let read = second
		.read(&user("u1"))
		.await
		.expect("Cookie store reads never fail.")
		.expect("Saved record should be readable.");

	assert_eq!(read, record);
}

#[tokio::test]
async fn cookie_value_is_opaque() {
	let store = store_with(CookieJar::new());

	store.save(record("u1")).await.expect("Saving into the cookie store should succeed.");

	let jar = store.jar().lock();
	let value = jar.get("oidc_token").expect("Canonical cookie should be set.").value();

	assert!(value.starts_with("A256GCM."));
	assert!(!value.contains("access-1"));
}

#[tokio::test]
async fn other_users_see_nothing_and_cookies_are_kept() {
	let first = store_with(CookieJar::new());

	first.save(record("u1")).await.expect("Saving into the cookie store should succeed.");

	let second = store_with(next_request(first.jar()));

	assert!(second.read(&user("u2")).await.expect("Cookie store reads never fail.").is_none());
	assert_eq!(second.jar().lock().delta().count(), 0);
	assert!(second.jar().lock().get("oidc_token").is_some());
}

#[tokio::test]
async fn tampered_cookie_reads_as_absent_and_is_cleared() {
	let first = store_with(CookieJar::new());

	first.save(record("u1")).await.expect("Saving into the cookie store should succeed.");

	let mut jar = next_request(first.jar());
	let original = jar.get("oidc_token").expect("Canonical cookie should be set.").value().to_owned();
	let mut bytes = original.into_bytes();
	let last = bytes.len() - 1;

	bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };

	let tampered = String::from_utf8(bytes).expect("Envelope should stay ASCII.");

	jar.add_original(Cookie::new("oidc_token", tampered));

	let second = store_with(jar);

	assert!(second.read(&user("u1")).await.expect("Cookie store reads never fail.").is_none());
	assert!(second.jar().lock().get("oidc_token").is_none());
	assert!(second.jar().lock().delta().any(|cookie| cookie.name() == "oidc_token"));
}

#[tokio::test]
async fn envelope_from_another_secret_is_discarded() {
	let foreign = CryptoEngine::new(&EncryptionSecret::new("other-secret"))
		.encrypt(&record("u1"))
		.expect("Encryption should succeed.");
	let mut jar = CookieJar::new();

	jar.add_original(Cookie::new("oidc_token", foreign));

	let store = store_with(jar);

	assert!(store.read(&user("u1")).await.expect("Cookie store reads never fail.").is_none());
}

#[tokio::test]
async fn large_records_are_chunked_and_reassembled() {
	let first = store_with(CookieJar::new());
	let mut record = record("u1");

	record.id_token = Some(TokenSecret::new("g".repeat(9_000)));

	first.save(record.clone()).await.expect("Saving into the cookie store should succeed.");

	let jar = next_request(first.jar());
	let names = cookie_names(&jar);

	assert!(!names.contains(&"oidc_token".to_owned()));
	assert!(names.len() >= 3);
	assert!(names.iter().all(|name| name.starts_with("oidc_token.")));

	let second = store_with(jar);
	let read = second
		.read(&user("u1"))
		.await
		.expect("Cookie store reads never fail.")
		.expect("Chunked record should be readable.");

	assert_eq!(read, record);

	// Shrinking back to a single cookie must drop every chunk.
	second.save(self::record("u1")).await.expect("Saving into the cookie store should succeed.");

	assert_eq!(cookie_names(&next_request(second.jar())), vec!["oidc_token".to_owned()]);
}

#[tokio::test]
async fn clear_removes_every_slot() {
	let first = store_with(CookieJar::new());
	let mut record = record("u1");

	record.id_token = Some(TokenSecret::new("g".repeat(5_000)));

	first.save(record).await.expect("Saving into the cookie store should succeed.");

	let second = store_with(next_request(first.jar()));

	second.clear(&user("u1")).await.expect("Clearing the cookie store should succeed.");

	assert!(second.jar().lock().iter().next().is_none());
	assert!(second.read(&user("u1")).await.expect("Cookie store reads never fail.").is_none());
}

#[tokio::test]
async fn clearing_for_another_user_keeps_the_owners_cookies() {
	let first = store_with(CookieJar::new());

	first.save(record("u1")).await.expect("Saving into the cookie store should succeed.");

	let second = store_with(next_request(first.jar()));

	second.clear(&user("u2")).await.expect("Clearing the cookie store should succeed.");

	assert_eq!(second.jar().lock().delta().count(), 0);
	assert!(second.read(&user("u1")).await.expect("Cookie store reads never fail.").is_some());

	second.clear(&user("u1")).await.expect("Clearing the cookie store should succeed.");

	assert!(second.jar().lock().iter().next().is_none());
}

#[tokio::test]
async fn clearing_removes_unreadable_cookies_for_anyone() {
	let mut jar = CookieJar::new();

	jar.add_original(Cookie::new("oidc_token", "not-an-envelope"));

	let store = store_with(jar);

	store.clear(&user("u2")).await.expect("Clearing the cookie store should succeed.");

	assert!(store.jar().lock().get("oidc_token").is_none());
}
