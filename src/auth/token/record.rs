//! Token record structs, freshness classification, and the refresh substitution rule.

// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
};

/// Whether a record's access token can be handed out as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
	/// Access token remains valid beyond the refresh threshold.
	Fresh,
	/// Access token expires within the threshold (or already expired).
	NeedsRefresh,
}

/// Errors produced by [`TokenRecordBuilder`] and structural validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token value is empty.
	#[error("Access token must not be empty.")]
	EmptyAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via access_token_expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when a relative expiry lands outside the representable date range.
	#[error("Access token expiry is out of range.")]
	ExpiryOutOfRange,
}
impl TokenRecordBuilderError {
	/// Serialized record field the error refers to.
	pub const fn path(&self) -> &'static str {
		match self {
			Self::MissingAccessToken | Self::EmptyAccessToken => "accessToken",
			Self::MissingExpiry | Self::ExpiryOutOfRange => "accessTokenExpiresAt",
		}
	}
}

/// Token set issued by the provider on behalf of one local user.
///
/// Serialized with camelCase keys and epoch-millisecond timestamps; this is the plaintext
/// sealed inside the cookie envelope.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
	/// Access token presented to the resource server; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// ID token carrying identity claims, used only for logout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<TokenSecret>,
	/// Access token deadline.
	#[serde(with = "epoch_millis")]
	pub access_token_expires_at: OffsetDateTime,
	/// Refresh token deadline, when the provider advertises one.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "epoch_millis::option")]
	pub refresh_token_expires_at: Option<OffsetDateTime>,
	/// Local session owner.
	pub user_id: UserId,
}
impl TokenRecord {
	/// Returns a builder for the provided owner.
	pub fn builder(user_id: UserId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(user_id)
	}

	/// Checks the required-field contract that deserialization alone cannot express.
	pub fn validate(&self) -> Result<(), TokenRecordBuilderError> {
		if self.access_token.is_empty() {
			return Err(TokenRecordBuilderError::EmptyAccessToken);
		}

		Ok(())
	}

	/// Classifies the access token against a lookahead `threshold` at `now`.
	///
	/// The record is fresh only while `now < access_token_expires_at - threshold`. A deadline so
	/// close to the minimum date that the subtraction underflows needs a refresh.
	pub fn freshness_at(&self, now: OffsetDateTime, threshold: Duration) -> Freshness {
		match self.access_token_expires_at.checked_sub(threshold) {
			Some(fresh_until) if now < fresh_until => Freshness::Fresh,
			_ => Freshness::NeedsRefresh,
		}
	}

	/// Returns `true` if the access token is past its deadline at `now`.
	pub fn is_access_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.access_token_expires_at
	}

	/// Returns `true` if the refresh token carries a deadline that has passed at `now`.
	pub fn is_refresh_expired_at(&self, now: OffsetDateTime) -> bool {
		self.refresh_token_expires_at.is_some_and(|deadline| now >= deadline)
	}

	/// Returns the refresh token when one is present and not expired at `now`.
	pub fn usable_refresh_token_at(&self, now: OffsetDateTime) -> Option<&TokenSecret> {
		if self.is_refresh_expired_at(now) {
			return None;
		}

		self.refresh_token.as_ref()
	}

	/// Builds the successor record after a successful refresh.
	///
	/// The access token and its deadline are always replaced. The ID token is replaced only when
	/// the provider returned one. The refresh token (and its deadline) is replaced only when the
	/// provider rotated it; otherwise the previous pair is kept.
	pub fn rotated(&self, grant: RefreshedTokens) -> TokenRecord {
		let (refresh_token, refresh_token_expires_at) = match grant.refresh_token {
			Some(rotated) =>
				(Some(rotated), grant.refresh_token_expires_at.map(truncate_to_millis)),
			None => (self.refresh_token.clone(), self.refresh_token_expires_at),
		};

		TokenRecord {
			access_token: grant.access_token,
			refresh_token,
			id_token: grant.id_token.or_else(|| self.id_token.clone()),
			access_token_expires_at: truncate_to_millis(grant.access_token_expires_at),
			refresh_token_expires_at,
			user_id: self.user_id.clone(),
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("user_id", &self.user_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("access_token_expires_at", &self.access_token_expires_at)
			.field("refresh_token_expires_at", &self.refresh_token_expires_at)
			.finish()
	}
}

/// Provider output of a successful refresh, validated and resolved against the exchange instant.
#[derive(Clone, Debug)]
pub struct RefreshedTokens {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Deadline of the new access token.
	pub access_token_expires_at: OffsetDateTime,
	/// Replacement ID token, if returned.
	pub id_token: Option<TokenSecret>,
	/// Rotated refresh token, if returned.
	pub refresh_token: Option<TokenSecret>,
	/// Deadline of the rotated refresh token; `None` means no deadline.
	pub refresh_token_expires_at: Option<OffsetDateTime>,
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	user_id: UserId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	access_token_expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	refresh_token_expires_at: Option<OffsetDateTime>,
}
impl TokenRecordBuilder {
	fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			access_token: None,
			refresh_token: None,
			id_token: None,
			issued_at: None,
			access_token_expires_at: None,
			expires_in: None,
			refresh_token_expires_at: None,
		}
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute access token deadline.
	pub fn access_token_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.access_token_expires_at = Some(instant);

		self
	}

	/// Sets the access token lifetime relative to the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets an absolute refresh token deadline.
	pub fn refresh_token_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.refresh_token_expires_at = Some(instant);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the ID token value.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	///
	/// Timestamps are truncated to millisecond precision so records survive storage unchanged.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let access_token_expires_at = match (self.access_token_expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};
		let record = TokenRecord {
			access_token,
			refresh_token: self.refresh_token,
			id_token: self.id_token,
			access_token_expires_at: truncate_to_millis(access_token_expires_at),
			refresh_token_expires_at: self.refresh_token_expires_at.map(truncate_to_millis),
			user_id: self.user_id,
		};

		record.validate()?;

		Ok(record)
	}
}

/// Converts an instant to epoch milliseconds, saturating at the `i64` range.
pub fn to_epoch_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}

/// Converts epoch milliseconds back to an instant, if representable.
pub fn from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

fn truncate_to_millis(instant: OffsetDateTime) -> OffsetDateTime {
	from_epoch_millis(to_epoch_millis(instant)).unwrap_or(instant)
}

pub(crate) mod epoch_millis {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use super::*;

	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(to_epoch_millis(*instant))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		from_epoch_millis(millis).ok_or_else(|| D::Error::custom("timestamp out of range"))
	}

	pub mod option {
		// crates.io
		use serde::{Deserializer, Serializer, de::Error as _};
		// self
		use super::super::*;

		pub fn serialize<S>(
			instant: &Option<OffsetDateTime>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match instant {
				Some(instant) => serializer.serialize_some(&to_epoch_millis(*instant)),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
		where
			D: Deserializer<'de>,
		{
			match Option::<i64>::deserialize(deserializer)? {
				Some(millis) => from_epoch_millis(millis)
					.map(Some)
					.ok_or_else(|| D::Error::custom("timestamp out of range")),
				None => Ok(None),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::{Date, Time, macros};
	// self
	use super::*;

	const THRESHOLD: Duration = Duration::minutes(5);

	fn user() -> UserId {
		UserId::new("u1").expect("User fixture should be valid.")
	}

	fn record(now: OffsetDateTime, expires_in: Duration) -> TokenRecord {
		TokenRecord::builder(user())
			.access_token("access")
			.refresh_token("refresh")
			.id_token("id")
			.access_token_expires_at(now + expires_in)
			.build()
			.expect("Token record fixture should build.")
	}

	#[test]
	fn freshness_boundary_follows_threshold() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		assert_eq!(
			record(now, THRESHOLD - Duration::milliseconds(1)).freshness_at(now, THRESHOLD),
			Freshness::NeedsRefresh
		);
		assert_eq!(record(now, THRESHOLD).freshness_at(now, THRESHOLD), Freshness::NeedsRefresh);
		assert_eq!(
			record(now, THRESHOLD + Duration::milliseconds(1)).freshness_at(now, THRESHOLD),
			Freshness::Fresh
		);
		assert_eq!(
			record(now, -Duration::minutes(1)).freshness_at(now, THRESHOLD),
			Freshness::NeedsRefresh
		);
	}

	#[test]
	fn deadline_near_the_minimum_date_needs_refresh() {
		let record = TokenRecord::builder(user())
			.access_token("access")
			.access_token_expires_at(OffsetDateTime::new_utc(Date::MIN, Time::MIDNIGHT))
			.build()
			.expect("Token record fixture should build.");

		assert_eq!(
			record.freshness_at(macros::datetime!(2025-01-01 00:00 UTC), THRESHOLD),
			Freshness::NeedsRefresh
		);
	}

	#[test]
	fn builder_rejects_relative_expiry_beyond_the_date_range() {
		let err = TokenRecord::builder(user())
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(i64::MAX))
			.build()
			.expect_err("Overflowing expiry must fail.");

		assert_eq!(err, TokenRecordBuilderError::ExpiryOutOfRange);
		assert_eq!(err.path(), "accessTokenExpiresAt");
		assert_eq!(TokenRecordBuilderError::EmptyAccessToken.path(), "accessToken");
	}

	#[test]
	fn builder_handles_relative_expiry_and_truncates() {
		let issued = macros::datetime!(2025-01-01 00:00:00.123_456 UTC);
		let record = TokenRecord::builder(user())
			.access_token("secret")
			.issued_at(issued)
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.access_token_expires_at, macros::datetime!(2025-01-01 00:30:00.123 UTC));
	}

	#[test]
	fn builder_rejects_missing_or_empty_access_token() {
		let missing = TokenRecord::builder(user()).expires_in(Duration::minutes(1)).build();
		let empty =
			TokenRecord::builder(user()).access_token("").expires_in(Duration::minutes(1)).build();
		let no_expiry = TokenRecord::builder(user()).access_token("a").build();

		assert_eq!(
			missing.expect_err("Missing token must fail."),
			TokenRecordBuilderError::MissingAccessToken
		);
		assert_eq!(
			empty.expect_err("Empty token must fail."),
			TokenRecordBuilderError::EmptyAccessToken
		);
		assert_eq!(
			no_expiry.expect_err("Missing expiry must fail."),
			TokenRecordBuilderError::MissingExpiry
		);
	}

	#[test]
	fn refresh_token_usability_respects_deadline() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let mut record = record(now, Duration::minutes(1));

		assert!(record.usable_refresh_token_at(now).is_some());

		record.refresh_token_expires_at = Some(now);

		assert!(record.usable_refresh_token_at(now).is_none());
		assert!(record.usable_refresh_token_at(now - Duration::seconds(1)).is_some());

		record.refresh_token = None;
		record.refresh_token_expires_at = None;

		assert!(record.usable_refresh_token_at(now).is_none());
	}

	#[test]
	fn rotation_keeps_refresh_token_when_provider_omits_it() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let mut previous = record(now, -Duration::minutes(1));

		previous.refresh_token_expires_at = Some(now + Duration::days(1));

		let next = previous.rotated(RefreshedTokens {
			access_token: TokenSecret::new("access-2"),
			access_token_expires_at: now + Duration::seconds(3600),
			id_token: None,
			refresh_token: None,
			refresh_token_expires_at: Some(now + Duration::seconds(60)),
		});

		assert_eq!(next.access_token.expose(), "access-2");
		assert_eq!(next.access_token_expires_at, now + Duration::hours(1));
		assert_eq!(next.refresh_token, previous.refresh_token);
		assert_eq!(next.refresh_token_expires_at, previous.refresh_token_expires_at);
		assert_eq!(next.id_token, previous.id_token);
		assert_eq!(next.user_id, previous.user_id);
	}

	#[test]
	fn rotation_replaces_refresh_pair_when_rotated() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let previous = record(now, Duration::ZERO);
		let next = previous.rotated(RefreshedTokens {
			access_token: TokenSecret::new("access-2"),
			access_token_expires_at: now + Duration::seconds(300),
			id_token: Some(TokenSecret::new("id-2")),
			refresh_token: Some(TokenSecret::new("refresh-2")),
			refresh_token_expires_at: Some(now + Duration::seconds(1800)),
		});

		assert_eq!(next.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
		assert_eq!(next.refresh_token_expires_at, Some(now + Duration::minutes(30)));
		assert_eq!(next.id_token.as_ref().map(TokenSecret::expose), Some("id-2"));
	}

	#[test]
	fn serde_uses_camel_case_and_epoch_millis() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let record = record(now, Duration::hours(1));
		let json = serde_json::to_value(&record).expect("Record should serialize.");

		assert_eq!(json["accessToken"], "access");
		assert_eq!(json["userId"], "u1");
		assert_eq!(json["accessTokenExpiresAt"], 1_735_693_200_000_i64);
		assert!(json.get("refreshTokenExpiresAt").is_none());

		let back: TokenRecord = serde_json::from_value(json).expect("Record should deserialize.");

		assert_eq!(back, record);
	}
}
