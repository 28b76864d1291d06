//! Transport primitives for provider calls (discovery GET, token endpoint POST).
//!
//! [`ReqwestHttpClient`] captures the status code and `Retry-After` hint of every response in a
//! [`ResponseMetadata`] so callers can classify failures without re-reading headers, and
//! [`HttpReply::parse`] locates malformed JSON with `serde_path_to_error`.

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	header::{ACCEPT, HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Metadata captured from the most recent HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Fully buffered response from a provider endpoint.
#[derive(Clone, Debug)]
pub struct HttpReply {
	/// Status and retry hints.
	pub metadata: ResponseMetadata,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.metadata.status.is_some_and(|status| (200..300).contains(&status))
	}

	/// Parses the body as JSON, reporting the failing path on error.
	pub fn parse<T>(&self, endpoint: &'static str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de)
			.map_err(|e| Error::MalformedResponse { endpoint, path: e.path().to_string() })
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Provider endpoints answer directly, so [`ReqwestHttpClient::new`] disables redirect following;
/// configure any custom client passed to [`ReqwestHttpClient::with_client`] the same way.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Issues a `GET` expecting JSON.
	pub async fn get_json(
		&self,
		endpoint: &'static str,
		url: &Url,
	) -> Result<HttpReply, TransportError> {
		let response = self
			.0
			.get(url.clone())
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| TransportError::network(endpoint, e))?;

		read_reply(endpoint, response).await
	}

	/// Issues a form-encoded `POST` expecting JSON.
	pub async fn post_form(
		&self,
		endpoint: &'static str,
		url: &Url,
		form: &[(&str, &str)],
	) -> Result<HttpReply, TransportError> {
		let response = self
			.0
			.post(url.clone())
			.header(ACCEPT, "application/json")
			.form(form)
			.send()
			.await
			.map_err(|e| TransportError::network(endpoint, e))?;

		read_reply(endpoint, response).await
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

async fn read_reply(
	endpoint: &'static str,
	response: reqwest::Response,
) -> Result<HttpReply, TransportError> {
	let status = response.status().as_u16();
	let retry_after = parse_retry_after(response.headers());
	let body = response.bytes().await.map_err(|e| TransportError::network(endpoint, e))?.to_vec();

	Ok(HttpReply { metadata: ResponseMetadata { status: Some(status), retry_after }, body })
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs.max(0)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
