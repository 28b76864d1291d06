//! Durable [`TokenStore`] keeping one `oidc_accounts` row per `(user_id, provider_id)`.
//!
//! Runs on `sqlx`'s `Any` driver so the same statements serve Postgres and SQLite. Statements use
//! `$N` placeholders, and the upsert relies on `ON CONFLICT ... DO UPDATE`, which both engines
//! support. Token columns hold `A256GCM` envelopes sealed with the operator secret; expiry columns
//! stay plain epoch milliseconds. Rows that cannot be opened or form no valid record are deleted
//! on read.

// crates.io
use sqlx::{AnyPool, FromRow, any::AnyPoolOptions};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenRecord, TokenSecret, UserId, from_epoch_millis, to_epoch_millis},
	crypto::CryptoEngine,
	error::ConfigError,
	obs,
	store::{self, StoreError, StoreFuture, TokenStore},
};

pub(crate) const BACKEND: &str = "sql";

const STRUCTURE: &str = "structure";

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS oidc_accounts (
	user_id TEXT NOT NULL,
	provider_id TEXT NOT NULL,
	access_token TEXT,
	refresh_token TEXT,
	id_token TEXT,
	access_token_expires_at BIGINT,
	refresh_token_expires_at BIGINT,
	PRIMARY KEY (user_id, provider_id)
)";
const UPSERT_SQL: &str = "\
INSERT INTO oidc_accounts (
	user_id, provider_id, access_token, refresh_token, id_token,
	access_token_expires_at, refresh_token_expires_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (user_id, provider_id) DO UPDATE SET
	access_token = excluded.access_token,
	refresh_token = excluded.refresh_token,
	id_token = excluded.id_token,
	access_token_expires_at = excluded.access_token_expires_at,
	refresh_token_expires_at = excluded.refresh_token_expires_at";
const SELECT_SQL: &str = "\
SELECT user_id, access_token, refresh_token, id_token,
	access_token_expires_at, refresh_token_expires_at
FROM oidc_accounts
WHERE user_id = $1 AND provider_id = $2";
const DELETE_SQL: &str = "DELETE FROM oidc_accounts WHERE user_id = $1 AND provider_id = $2";

#[derive(Debug, FromRow)]
struct AccountRow {
	user_id: String,
	access_token: Option<String>,
	refresh_token: Option<String>,
	id_token: Option<String>,
	access_token_expires_at: Option<i64>,
	refresh_token_expires_at: Option<i64>,
}
impl AccountRow {
	/// Opens the sealed columns; the error is the discard reason.
	fn into_record(self, crypto: &CryptoEngine) -> Result<TokenRecord, &'static str> {
		let open = |envelope: String| crypto.open_token(&envelope).map_err(|e| e.kind());
		let instant = |millis: i64| from_epoch_millis(millis).ok_or(STRUCTURE);
		let record = TokenRecord {
			access_token: open(self.access_token.ok_or(STRUCTURE)?)?,
			refresh_token: self.refresh_token.map(open).transpose()?,
			id_token: self.id_token.map(open).transpose()?,
			access_token_expires_at: instant(self.access_token_expires_at.ok_or(STRUCTURE)?)?,
			refresh_token_expires_at: self.refresh_token_expires_at.map(instant).transpose()?,
			user_id: UserId::new(self.user_id).map_err(|_| STRUCTURE)?,
		};

		record.validate().map_err(|_| STRUCTURE)?;

		Ok(record)
	}
}

/// SQL-backed store scoped to one identity provider.
#[derive(Clone, Debug)]
pub struct SqlStore {
	pool: AnyPool,
	provider_id: ProviderId,
	crypto: Arc<CryptoEngine>,
}
impl SqlStore {
	/// Connects to `database_url` (any URL scheme `sqlx` recognizes).
	pub async fn connect(
		database_url: &str,
		provider_id: ProviderId,
		crypto: Arc<CryptoEngine>,
	) -> Result<Self, ConfigError> {
		sqlx::any::install_default_drivers();

		let pool = AnyPoolOptions::new()
			.connect(database_url)
			.await
			.map_err(|e| ConfigError::Database { message: e.to_string() })?;

		Ok(Self::with_pool(pool, provider_id, crypto))
	}

	/// Wraps an existing pool.
	pub fn with_pool(pool: AnyPool, provider_id: ProviderId, crypto: Arc<CryptoEngine>) -> Self {
		Self { pool, provider_id, crypto }
	}

	/// Underlying connection pool.
	pub fn pool(&self) -> &AnyPool {
		&self.pool
	}

	/// Provider every row written by this store is keyed under.
	pub fn provider_id(&self) -> &ProviderId {
		&self.provider_id
	}

	/// Creates the `oidc_accounts` table when it does not exist yet.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await.map_err(backend_error)?;

		Ok(())
	}

	async fn save_now(&self, record: TokenRecord) -> Result<(), StoreError> {
		let seal = |token: &TokenSecret| {
			self.crypto
				.seal_token(token)
				.map_err(|e| StoreError::Serialization { message: e.to_string() })
		};
		let access_token = seal(&record.access_token)?;
		let refresh_token = record.refresh_token.as_ref().map(seal).transpose()?;
		let id_token = record.id_token.as_ref().map(seal).transpose()?;

		sqlx::query(UPSERT_SQL)
			.bind(record.user_id.to_string())
			.bind(self.provider_id.to_string())
			.bind(access_token)
			.bind(refresh_token)
			.bind(id_token)
			.bind(to_epoch_millis(record.access_token_expires_at))
			.bind(record.refresh_token_expires_at.map(to_epoch_millis))
			.execute(&self.pool)
			.await
			.map_err(backend_error)?;

		Ok(())
	}

	async fn read_now(&self, user_id: &UserId) -> Result<Option<TokenRecord>, StoreError> {
		let row = sqlx::query_as::<_, AccountRow>(SELECT_SQL)
			.bind(user_id.to_string())
			.bind(self.provider_id.to_string())
			.fetch_optional(&self.pool)
			.await
			.map_err(backend_error)?;
		let Some(row) = row else {
			return Ok(None);
		};

		match row.into_record(&self.crypto) {
			Ok(record) => Ok(store::owned_by(BACKEND, record, user_id)),
			Err(reason) => {
				obs::record_discard(BACKEND, reason);
				self.clear_now(user_id).await?;

				Ok(None)
			},
		}
	}

	async fn clear_now(&self, user_id: &UserId) -> Result<(), StoreError> {
		sqlx::query(DELETE_SQL)
			.bind(user_id.to_string())
			.bind(self.provider_id.to_string())
			.execute(&self.pool)
			.await
			.map_err(backend_error)?;

		Ok(())
	}
}
impl TokenStore for SqlStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(self.save_now(record))
	}

	fn read<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(self.read_now(user_id))
	}

	fn clear<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, ()> {
		Box::pin(self.clear_now(user_id))
	}
}

fn backend_error(e: sqlx::Error) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}
