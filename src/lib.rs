//! OIDC token lifecycle for web sessions: encrypted cookie or SQL token stores, chunked cookie
//! transport, and proactive refresh against the identity provider.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod client;
pub mod config;
pub mod cookie;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod http;
pub mod keeper;
pub mod lifecycle;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` feature, never in regular builds.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{TokenRecord, UserId},
		discovery::DiscoveryCache,
		http::ReqwestHttpClient,
		lifecycle::{ClientCredentials, TokenManager},
		store::{MemoryStore, TokenStore},
	};

	/// Builds a reqwest HTTP client used across integration tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Parses a user identifier fixture.
	pub fn user(id: &str) -> UserId {
		UserId::new(id).expect("User identifier fixture should be valid.")
	}

	/// Builds a record fixture expiring `expires_in` after `now`.
	pub fn record_fixture(
		user_id: &UserId,
		access: &str,
		refresh: Option<&str>,
		now: OffsetDateTime,
		expires_in: Duration,
	) -> TokenRecord {
		let mut builder = TokenRecord::builder(user_id.clone())
			.access_token(access)
			.access_token_expires_at(now + expires_in);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Token record fixture should build successfully.")
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store and a discovery cache pointed at
	/// `discovery_url`.
	pub fn build_test_manager(discovery_url: &str) -> (TokenManager, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let http = test_reqwest_http_client();
		let discovery = Arc::new(DiscoveryCache::new(
			Url::parse(discovery_url).expect("Discovery URL fixture should parse."),
			http.clone(),
		));
		let manager = TokenManager::new(
			store,
			discovery,
			http,
			ClientCredentials::new("client-keeper", "secret-keeper"),
		);

		(manager, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
