//! Chunked cookie transport for values larger than a single cookie can hold.
//!
//! A value at or below the chunk threshold travels verbatim under the canonical name
//! (`oidc_token`). Anything larger is split into threshold-sized chunks named
//! `oidc_token.0`, `oidc_token.1`, … . Every write also removes the slots it does not use,
//! so a shrinking value never leaves stale chunks behind. The codec never looks inside the
//! value.

pub use ::cookie::{Cookie, CookieJar, SameSite};

// self
use crate::_prelude::*;

/// Canonical cookie name used for the encrypted token envelope.
pub const DEFAULT_COOKIE_NAME: &str = "oidc_token";
/// Largest value written as a single cookie; leaves headroom under the 4096-byte ceiling for the
/// name and attributes.
pub const DEFAULT_CHUNK_THRESHOLD: usize = 3896;
/// Chunk indices `0..STALE_CHUNK_RANGE` are always accounted for on write and clear.
pub const STALE_CHUNK_RANGE: usize = 10;

/// Cookie jar shared between the request handler and a request-scoped store.
///
/// The handler seeds it with the inbound cookies (`add_original`) and emits `delta()` as
/// `Set-Cookie` headers once the request completes.
pub type SharedCookieJar = Arc<Mutex<CookieJar>>;

/// Attributes applied to every cookie the codec sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
	/// Cookie path.
	pub path: String,
	/// Send on HTTPS only.
	pub secure: bool,
	/// Hide from page scripts.
	pub http_only: bool,
	/// SameSite policy.
	pub same_site: SameSite,
	/// Cookie lifetime; should match the intended session lifetime.
	pub max_age: Duration,
}
impl Default for CookieOptions {
	fn default() -> Self {
		Self {
			path: "/".into(),
			secure: true,
			http_only: true,
			same_site: SameSite::Lax,
			max_age: Duration::days(7),
		}
	}
}

/// One cookie mutation produced by the codec.
#[derive(Clone, Debug, PartialEq)]
pub enum CookieOp {
	/// Set (or overwrite) a cookie.
	Set(Cookie<'static>),
	/// Remove a cookie; the value carries the name and path to match.
	Remove(Cookie<'static>),
}
impl CookieOp {
	/// Name of the cookie affected by this operation.
	pub fn name(&self) -> &str {
		match self {
			Self::Set(cookie) | Self::Remove(cookie) => cookie.name(),
		}
	}

	/// Renders the operation as the cookie to place in a `Set-Cookie` header.
	pub fn to_set_cookie(&self) -> Cookie<'static> {
		match self {
			Self::Set(cookie) => cookie.clone(),
			Self::Remove(cookie) => {
				let mut removal = cookie.clone();

				removal.make_removal();

				removal
			},
		}
	}

	/// Applies the operation to a jar so its `delta()` reflects the change.
	pub fn apply(self, jar: &mut CookieJar) {
		match self {
			Self::Set(cookie) => jar.add(cookie),
			Self::Remove(cookie) => jar.remove(cookie),
		}
	}
}

/// Splits and reassembles an opaque string across size-bounded cookie slots.
#[derive(Clone, Debug)]
pub struct ChunkedCookieCodec {
	name: String,
	threshold: usize,
	options: CookieOptions,
}
impl ChunkedCookieCodec {
	/// Creates a codec for the provided canonical name with default threshold and attributes.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			threshold: DEFAULT_CHUNK_THRESHOLD,
			options: CookieOptions::default(),
		}
	}

	/// Overrides the single-cookie threshold (clamped to at least one byte).
	pub fn with_threshold(mut self, threshold: usize) -> Self {
		self.threshold = threshold.max(1);

		self
	}

	/// Overrides the cookie attributes.
	pub fn with_options(mut self, options: CookieOptions) -> Self {
		self.options = options;

		self
	}

	/// Canonical cookie name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Single-cookie threshold in bytes.
	pub fn threshold(&self) -> usize {
		self.threshold
	}

	/// Attributes applied to written cookies.
	pub fn options(&self) -> &CookieOptions {
		&self.options
	}

	/// Name of the chunk slot at `index`.
	pub fn chunk_name(&self, index: usize) -> String {
		format!("{}.{index}", self.name)
	}

	/// Produces the operations that store `value`, removing every slot the value does not use.
	pub fn write(&self, value: &str) -> Vec<CookieOp> {
		let mut ops = Vec::new();

		if value.len() <= self.threshold {
			ops.push(CookieOp::Set(self.build_cookie(self.name.clone(), value)));
			ops.extend((0..STALE_CHUNK_RANGE).map(|index| self.removal(self.chunk_name(index))));

			return ops;
		}

		let chunks = split_chunks(value, self.threshold);

		ops.extend(chunks.iter().enumerate().map(|(index, chunk)| {
			CookieOp::Set(self.build_cookie(self.chunk_name(index), chunk))
		}));
		ops.push(self.removal(self.name.clone()));
		ops.extend(
			(chunks.len()..STALE_CHUNK_RANGE).map(|index| self.removal(self.chunk_name(index))),
		);

		ops
	}

	/// Produces the operations that remove the canonical cookie and every tracked chunk slot.
	pub fn clear(&self) -> Vec<CookieOp> {
		let mut ops = vec![self.removal(self.name.clone())];

		ops.extend((0..STALE_CHUNK_RANGE).map(|index| self.removal(self.chunk_name(index))));

		ops
	}

	/// Reassembles the stored value, if any.
	///
	/// The canonical cookie wins over chunks. Chunks are ordered by their numeric suffix, so
	/// `name.10` follows `name.9`.
	pub fn read(&self, jar: &CookieJar) -> Option<String> {
		if let Some(cookie) = jar.get(&self.name) {
			return Some(cookie.value().to_owned());
		}

		let prefix = format!("{}.", self.name);
		let mut chunks = jar
			.iter()
			.filter_map(|cookie| {
				let suffix = cookie.name().strip_prefix(prefix.as_str())?;

				if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
					return None;
				}

				Some((suffix.parse::<usize>().ok()?, cookie.value()))
			})
			.collect::<Vec<_>>();

		if chunks.is_empty() {
			return None;
		}

		chunks.sort_by_key(|(index, _)| *index);

		Some(chunks.into_iter().map(|(_, value)| value).collect())
	}

	/// Writes `value` straight into `jar`.
	pub fn write_to(&self, jar: &mut CookieJar, value: &str) {
		self.write(value).into_iter().for_each(|op| op.apply(jar));
	}

	/// Clears every slot from `jar`.
	pub fn clear_from(&self, jar: &mut CookieJar) {
		self.clear().into_iter().for_each(|op| op.apply(jar));
	}

	fn build_cookie(&self, name: String, value: &str) -> Cookie<'static> {
		Cookie::build((name, value.to_owned()))
			.path(self.options.path.clone())
			.secure(self.options.secure)
			.http_only(self.options.http_only)
			.same_site(self.options.same_site)
			.max_age(self.options.max_age)
			.build()
	}

	fn removal(&self, name: String) -> CookieOp {
		CookieOp::Remove(Cookie::build(name).path(self.options.path.clone()).build())
	}
}
impl Default for ChunkedCookieCodec {
	fn default() -> Self {
		Self::new(DEFAULT_COOKIE_NAME)
	}
}

// Splits on char boundaries so non-ASCII input never panics; envelopes are ASCII, where every
// chunk except the last is exactly `size` bytes.
fn split_chunks(value: &str, size: usize) -> Vec<&str> {
	let mut chunks = Vec::with_capacity(value.len().div_ceil(size));
	let mut rest = value;

	while !rest.is_empty() {
		let mut end = size.min(rest.len());

		while !rest.is_char_boundary(end) {
			end -= 1;
		}
		if end == 0 {
			end = rest.chars().next().map_or(rest.len(), char::len_utf8);
		}

		let (head, tail) = rest.split_at(end);

		chunks.push(head);
		rest = tail;
	}

	chunks
}
