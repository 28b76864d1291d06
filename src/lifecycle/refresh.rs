//! `grant_type=refresh_token` exchange and successor-record persistence.

// self
use crate::{
	_prelude::*,
	auth::{RefreshedTokens, TokenRecord, TokenSecret},
	error::TokenKind,
	http::HttpReply,
	lifecycle::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const TOKEN_ENDPOINT: &str = "token";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	id_token: Option<String>,
	expires_in: i64,
	#[serde(default)]
	refresh_expires_in: Option<i64>,
}
impl RefreshResponse {
	fn into_tokens(self, now: OffsetDateTime) -> Result<RefreshedTokens> {
		if self.access_token.is_empty() {
			return Err(malformed("access_token"));
		}
		if self.expires_in <= 0 {
			return Err(malformed("expires_in"));
		}

		let access_token_expires_at = deadline(now, self.expires_in, "expires_in")?;
		let refresh_token_expires_at = match self.refresh_expires_in.filter(|secs| *secs > 0) {
			Some(secs) => Some(deadline(now, secs, "refresh_expires_in")?),
			None => None,
		};

		Ok(RefreshedTokens {
			access_token: TokenSecret::new(self.access_token),
			access_token_expires_at,
			id_token: self.id_token.filter(|token| !token.is_empty()).map(TokenSecret::new),
			refresh_token: self.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new),
			refresh_token_expires_at,
		})
	}
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
	#[serde(default)]
	error: Option<String>,
}

impl TokenManager {
	/// Exchanges the record's refresh token and persists the successor record.
	pub(crate) async fn refresh_at(
		&self,
		record: TokenRecord,
		now: OffsetDateTime,
	) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_at");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span.instrument(self.exchange(&record, now)).await;

		match &result {
			Ok(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.refresh_metrics.record_success();
			},
			Err(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.refresh_metrics.record_failure();
			},
		}

		result
	}

	async fn exchange(&self, record: &TokenRecord, now: OffsetDateTime) -> Result<TokenRecord> {
		let refresh_token = record
			.usable_refresh_token_at(now)
			.ok_or(Error::Expired { token: TokenKind::Refresh })?;
		let info = self.discovery.get_at(now).await.ok_or(Error::EndpointUnavailable)?;
		let endpoint = info.token_endpoint.as_ref().ok_or(Error::EndpointUnavailable)?;
		let form = [
			("grant_type", "refresh_token"),
			("refresh_token", refresh_token.expose()),
			("client_id", self.credentials.client_id()),
			("client_secret", self.credentials.client_secret().expose()),
		];
		let reply = self.http.post_form(TOKEN_ENDPOINT, endpoint, &form).await?;

		if !reply.is_success() {
			return Err(rejection(&reply));
		}

		let tokens = reply.parse::<RefreshResponse>(TOKEN_ENDPOINT)?.into_tokens(now)?;
		let next = record.rotated(tokens);

		if let Err(e) = self.store.save(next.clone()).await {
			obs::warn_flow_failure(FlowKind::Refresh, "persist_refreshed", &Error::from(e));
		}

		Ok(next)
	}
}

fn rejection(reply: &HttpReply) -> Error {
	let status = reply.metadata.status;
	let reason = serde_json::from_slice::<ErrorResponse>(&reply.body)
		.ok()
		.and_then(|body| body.error)
		.unwrap_or_else(|| format!("HTTP {}", status.unwrap_or_default()));

	Error::RefreshFailed { status, reason, retry_after: reply.metadata.retry_after }
}

fn deadline(now: OffsetDateTime, secs: i64, path: &str) -> Result<OffsetDateTime> {
	now.checked_add(Duration::seconds(secs)).ok_or_else(|| malformed(path))
}

fn malformed(path: &str) -> Error {
	Error::MalformedResponse { endpoint: TOKEN_ENDPOINT, path: path.into() }
}
