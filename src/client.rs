//! Per-call API clients bound to one user's bearer token.
//!
//! [`ClientFactory::for_user`] builds a brand-new [`ReqwestClient`] on every call, so a bearer
//! token set as a default header can never bleed into a request made for a different user.

// crates.io
use reqwest::{
	Method, RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	lifecycle::TokenManager,
};

/// Reasons [`ClientFactory::for_user`] could not produce a client.
#[derive(Debug, ThisError)]
pub enum ClientError {
	/// No valid access token could be obtained; the caller should send the user to sign in.
	#[error("No valid access token is available; the user must sign in again.")]
	Unauthenticated,
	/// The access token cannot be carried in an HTTP header.
	#[error("Access token contains characters that are not valid in an HTTP header.")]
	InvalidToken,
	/// The HTTP client could not be constructed.
	#[error("API client could not be constructed.")]
	Build(#[from] ReqwestError),
}
impl ClientError {
	/// Returns `true` when the caller should redirect to sign-in.
	pub fn is_unauthenticated(&self) -> bool {
		matches!(self, Self::Unauthenticated)
	}
}

/// Produces [`ApiClient`]s for the configured resource server.
#[derive(Clone, Debug)]
pub struct ClientFactory {
	manager: TokenManager,
	base_url: Url,
}
impl ClientFactory {
	/// Creates a factory resolving tokens through `manager`. Relative paths resolve under
	/// `base_url`.
	pub fn new(manager: TokenManager, base_url: Url) -> Self {
		Self { manager, base_url: with_trailing_slash(base_url) }
	}

	/// Resource server base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Resolves a valid token for `user_id` and returns a fresh client bound to it.
	pub async fn for_user(&self, user_id: &UserId) -> Result<ApiClient, ClientError> {
		let token = self.manager.get_valid_token(user_id).await.ok_or(ClientError::Unauthenticated)?;

		ApiClient::new(user_id.clone(), &token, self.base_url.clone())
	}
}

/// HTTP client carrying one user's bearer token on every request.
#[derive(Clone)]
pub struct ApiClient {
	http: ReqwestClient,
	base_url: Url,
	user_id: UserId,
}
impl ApiClient {
	fn new(user_id: UserId, token: &TokenSecret, base_url: Url) -> Result<Self, ClientError> {
		let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
			.map_err(|_| ClientError::InvalidToken)?;

		bearer.set_sensitive(true);

		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, bearer);

		let http = ReqwestClient::builder().default_headers(headers).build()?;

		Ok(Self { http, base_url, user_id })
	}

	/// User this client acts for.
	pub fn user_id(&self) -> &UserId {
		&self.user_id
	}

	/// Resource server base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Underlying reqwest client, already carrying the bearer header.
	pub fn http(&self) -> &ReqwestClient {
		&self.http
	}

	/// Starts a request for `path`, resolved relative to the base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, url::ParseError> {
		let url = self.base_url.join(path.trim_start_matches('/'))?;

		Ok(self.http.request(method, url))
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("user_id", &self.user_id)
			.field("base_url", &self.base_url.as_str())
			.finish_non_exhaustive()
	}
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn client(base: &str) -> ApiClient {
		ApiClient::new(
			UserId::new("u1").expect("User fixture should be valid."),
			&TokenSecret::new("token-1"),
			with_trailing_slash(Url::parse(base).expect("Base URL fixture should parse.")),
		)
		.expect("API client should build.")
	}

	#[test]
	fn paths_resolve_under_base_path() {
		let client = client("https://api.example.com/v1");
		let request = client
			.request(Method::GET, "/catalog/items")
			.expect("Path should join.")
			.build()
			.expect("Request should build.");

		assert_eq!(request.url().as_str(), "https://api.example.com/v1/catalog/items");
	}

	#[test]
	fn debug_output_hides_token() {
		let rendered = format!("{:?}", client("https://api.example.com"));

		assert!(!rendered.contains("token-1"));
	}

	#[test]
	fn header_unsafe_tokens_are_rejected() {
		let err = ApiClient::new(
			UserId::new("u1").expect("User fixture should be valid."),
			&TokenSecret::new("bad\ntoken"),
			Url::parse("https://api.example.com/").expect("Base URL fixture should parse."),
		)
		.expect_err("Newlines cannot travel in a header.");

		assert!(matches!(err, ClientError::InvalidToken));
		assert!(!err.is_unauthenticated());
	}
}
