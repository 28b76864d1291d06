//! Authenticated encryption of token records into a self-describing, cookie-safe envelope.
//!
//! An envelope is four dot-separated segments:
//!
//! ```text
//! A256GCM.<nonce>.<tag>.<ciphertext>
//! ```
//!
//! Binary segments use unpadded URL-safe base64, so the whole envelope is a valid cookie value.
//! The AES-256-GCM key is the SHA-256 digest of the operator secret, which lets secrets of any
//! length key the cipher. The algorithm label doubles as associated data.

// crates.io
use aes_gcm::{
	Aes256Gcm, Nonce, Tag,
	aead::{
		AeadInPlace, KeyInit,
		consts::{U12, U16},
	},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{EncryptionSecret, TokenRecord, TokenSecret},
};

/// Algorithm label written as the first envelope segment.
pub const ENVELOPE_ALGORITHM: &str = "A256GCM";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Failures raised while sealing or opening an envelope.
///
/// None of the variants carry key material or plaintext.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CryptoError {
	/// Input is not a well-formed envelope.
	#[error("Encrypted envelope is malformed: {reason}.")]
	Format {
		/// Which structural check failed.
		reason: &'static str,
	},
	/// Authentication tag did not verify (corruption, tampering, or a different key).
	#[error("Encrypted envelope failed authentication.")]
	Tamper,
	/// Decryption succeeded but the payload is not a valid token record.
	#[error("Decrypted payload is not a valid token record at `{path}`: {reason}.")]
	Structure {
		/// JSON path of the offending field.
		path: String,
		/// Error category, never the offending value.
		reason: String,
	},
	/// The record could not be sealed.
	#[error("Token record could not be encrypted.")]
	Seal,
}
impl CryptoError {
	/// Returns a stable label for the error kind, safe to log.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Format { .. } => "format",
			Self::Tamper => "tamper",
			Self::Structure { .. } => "structure",
			Self::Seal => "seal",
		}
	}
}

/// Symmetric engine sealing [`TokenRecord`] values with a key derived from the configured secret.
#[derive(Clone)]
pub struct CryptoEngine {
	cipher: Aes256Gcm,
}
impl CryptoEngine {
	/// Derives the 256-bit key from `secret` and prepares the cipher.
	pub fn new(secret: &EncryptionSecret) -> Self {
		let key = Sha256::digest(secret.as_bytes());

		Self { cipher: Aes256Gcm::new(&key) }
	}

	/// Serializes and seals a record into an opaque envelope string.
	pub fn encrypt(&self, record: &TokenRecord) -> Result<String, CryptoError> {
		let plaintext = serde_json::to_vec(record).map_err(|_| CryptoError::Seal)?;

		self.seal(plaintext)
	}

	/// Opens an envelope and validates the decoded record.
	pub fn decrypt(&self, envelope: &str) -> Result<TokenRecord, CryptoError> {
		let plaintext = self.open(envelope)?;
		let de = &mut serde_json::Deserializer::from_slice(&plaintext);
		let record: TokenRecord = serde_path_to_error::deserialize(de).map_err(|e| {
			CryptoError::Structure {
				path: e.path().to_string(),
				reason: format!("{:?}", e.inner().classify()).to_lowercase(),
			}
		})?;

		record.validate().map_err(|e| CryptoError::Structure {
			path: e.path().into(),
			reason: e.to_string(),
		})?;

		Ok(record)
	}

	/// Seals a single token value into an envelope of the same format.
	///
	/// Used by stores that keep each token in its own column.
	pub fn seal_token(&self, token: &TokenSecret) -> Result<String, CryptoError> {
		self.seal(token.expose().as_bytes().to_vec())
	}

	/// Opens an envelope produced by [`CryptoEngine::seal_token`].
	pub fn open_token(&self, envelope: &str) -> Result<TokenSecret, CryptoError> {
		let plaintext = self.open(envelope)?;

		String::from_utf8(plaintext).map(TokenSecret::new).map_err(|_| CryptoError::Structure {
			path: "token".into(),
			reason: "invalid utf-8".into(),
		})
	}

	pub(crate) fn seal(&self, mut buffer: Vec<u8>) -> Result<String, CryptoError> {
		let mut nonce = [0_u8; NONCE_LEN];

		rand::rng().fill(&mut nonce);

		let tag = self
			.cipher
			.encrypt_in_place_detached(
				Nonce::<U12>::from_slice(&nonce),
				ENVELOPE_ALGORITHM.as_bytes(),
				&mut buffer,
			)
			.map_err(|_| CryptoError::Seal)?;

		Ok(format!(
			"{ENVELOPE_ALGORITHM}.{}.{}.{}",
			URL_SAFE_NO_PAD.encode(nonce),
			URL_SAFE_NO_PAD.encode(tag),
			URL_SAFE_NO_PAD.encode(&buffer),
		))
	}

	fn open(&self, envelope: &str) -> Result<Vec<u8>, CryptoError> {
		let mut segments = envelope.split('.');
		let (Some(algorithm), Some(nonce), Some(tag), Some(ciphertext), None) = (
			segments.next(),
			segments.next(),
			segments.next(),
			segments.next(),
			segments.next(),
		) else {
			return Err(CryptoError::Format { reason: "expected four segments" });
		};

		if algorithm != ENVELOPE_ALGORITHM {
			return Err(CryptoError::Format { reason: "unsupported algorithm" });
		}

		let nonce = decode_segment(nonce, "nonce is not base64")?;
		let tag = decode_segment(tag, "tag is not base64")?;
		let mut buffer = decode_segment(ciphertext, "ciphertext is not base64")?;

		if nonce.len() != NONCE_LEN {
			return Err(CryptoError::Format { reason: "nonce has the wrong length" });
		}
		if tag.len() != TAG_LEN {
			return Err(CryptoError::Format { reason: "tag has the wrong length" });
		}

		self.cipher
			.decrypt_in_place_detached(
				Nonce::<U12>::from_slice(&nonce),
				ENVELOPE_ALGORITHM.as_bytes(),
				&mut buffer,
				Tag::<U16>::from_slice(&tag),
			)
			.map_err(|_| CryptoError::Tamper)?;

		Ok(buffer)
	}
}
impl Debug for CryptoEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CryptoEngine(<redacted>)")
	}
}

fn decode_segment(segment: &str, reason: &'static str) -> Result<Vec<u8>, CryptoError> {
	URL_SAFE_NO_PAD.decode(segment).map_err(|_| CryptoError::Format { reason })
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{TokenRecordBuilderError, UserId};

	fn engine(secret: &str) -> CryptoEngine {
		CryptoEngine::new(&EncryptionSecret::new(secret))
	}

	fn record() -> TokenRecord {
		TokenRecord::builder(UserId::new("u1").expect("User fixture should be valid."))
			.access_token("abc")
			.access_token_expires_at(macros::datetime!(2025-01-01 01:00 UTC))
			.build()
			.expect("Token record fixture should build.")
	}

	fn rebuild(segments: &[&str]) -> String {
		segments.join(".")
	}

	#[test]
	fn round_trip_with_same_secret() {
		let engine = engine("s1");
		let record = record();
		let envelope = engine.encrypt(&record).expect("Encryption should succeed.");

		assert_eq!(engine.decrypt(&envelope).expect("Decryption should succeed."), record);
	}

	#[test]
	fn round_trip_preserves_optional_fields() {
		let engine = engine("a much longer operator secret that is not 32 bytes at all");
		let mut record = record();

		record.refresh_token = Some(TokenSecret::new("refresh"));
		record.id_token = Some(TokenSecret::new("id"));
		record.refresh_token_expires_at = Some(macros::datetime!(2025-01-02 00:00 UTC));

		let envelope = engine.encrypt(&record).expect("Encryption should succeed.");

		assert_eq!(engine.decrypt(&envelope).expect("Decryption should succeed."), record);
	}

	#[test]
	fn different_secret_is_reported_as_tamper() {
		let envelope = engine("s1").encrypt(&record()).expect("Encryption should succeed.");

		assert_eq!(engine("s2").decrypt(&envelope), Err(CryptoError::Tamper));
	}

	#[test]
	fn nonces_differ_between_encryptions() {
		let engine = engine("s1");
		let first = engine.encrypt(&record()).expect("Encryption should succeed.");
		let second = engine.encrypt(&record()).expect("Encryption should succeed.");

		assert_ne!(first, second);
	}

	#[test]
	fn envelope_is_cookie_safe_and_self_describing() {
		let envelope = engine("s1").encrypt(&record()).expect("Encryption should succeed.");

		assert!(envelope.starts_with("A256GCM."));
		assert_eq!(envelope.split('.').count(), 4);
		assert!(
			envelope.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
		);
	}

	#[test]
	fn flipping_any_ciphertext_byte_is_detected() {
		let engine = engine("s1");
		let envelope = engine.encrypt(&record()).expect("Encryption should succeed.");
		let segments: Vec<&str> = envelope.split('.').collect();
		let ciphertext =
			URL_SAFE_NO_PAD.decode(segments[3]).expect("Ciphertext segment should decode.");

		for index in 0..ciphertext.len() {
			let mut flipped = ciphertext.clone();

			flipped[index] ^= 0x01;

			let encoded = URL_SAFE_NO_PAD.encode(&flipped);
			let tampered = rebuild(&[segments[0], segments[1], segments[2], &encoded]);

			assert_eq!(engine.decrypt(&tampered), Err(CryptoError::Tamper), "byte {index}");
		}
	}

	#[test]
	fn flipping_tag_or_nonce_is_detected() {
		let engine = engine("s1");
		let envelope = engine.encrypt(&record()).expect("Encryption should succeed.");
		let segments: Vec<&str> = envelope.split('.').collect();

		for position in [1, 2] {
			let mut bytes =
				URL_SAFE_NO_PAD.decode(segments[position]).expect("Segment should decode.");

			bytes[0] ^= 0x80;

			let encoded = URL_SAFE_NO_PAD.encode(&bytes);
			let mut parts = segments.clone();

			parts[position] = &encoded;

			assert_eq!(engine.decrypt(&rebuild(&parts)), Err(CryptoError::Tamper));
		}
	}

	#[test]
	fn malformed_envelopes_are_format_errors() {
		let engine = engine("s1");
		let envelope = engine.encrypt(&record()).expect("Encryption should succeed.");
		let segments: Vec<&str> = envelope.split('.').collect();

		for input in [
			String::new(),
			"not-an-envelope".to_owned(),
			rebuild(&["A128CBC", segments[1], segments[2], segments[3]]),
			rebuild(&[segments[0], "***", segments[2], segments[3]]),
			rebuild(&[segments[0], "AAAA", segments[2], segments[3]]),
			rebuild(&[segments[0], segments[1], "AAAA", segments[3]]),
			format!("{envelope}.extra"),
		] {
			assert!(
				matches!(engine.decrypt(&input), Err(CryptoError::Format { .. })),
				"input {input:?} should be a format error"
			);
		}
	}

	#[test]
	fn authentic_but_invalid_payloads_are_structure_errors() {
		let engine = engine("s1");

		for payload in [
			&b"not json"[..],
			br#"{"userId":"u1","accessTokenExpiresAt":1}"#,
			br#"{"accessToken":"a","userId":"u1"}"#,
			br#"{"accessToken":"","userId":"u1","accessTokenExpiresAt":1}"#,
			br#"{"accessToken":"a","userId":"","accessTokenExpiresAt":1}"#,
		] {
			let envelope = engine.seal(payload.to_vec()).expect("Sealing should succeed.");

			assert!(matches!(engine.decrypt(&envelope), Err(CryptoError::Structure { .. })));
		}
	}

	#[test]
	fn single_tokens_seal_and_open() {
		let engine = engine("s1");
		let sealed =
			engine.seal_token(&TokenSecret::new("refresh-1")).expect("Sealing should succeed.");

		assert!(sealed.starts_with("A256GCM."));
		assert!(!sealed.contains("refresh-1"));
		assert_eq!(
			engine.open_token(&sealed).expect("Opening should succeed.").expose(),
			"refresh-1"
		);
		assert_eq!(self::engine("s2").open_token(&sealed).map(|_| ()), Err(CryptoError::Tamper));
		assert!(matches!(engine.open_token("refresh-1"), Err(CryptoError::Format { .. })));

		let binary = engine.seal(vec![0xff, 0xfe]).expect("Sealing should succeed.");

		assert_eq!(engine.open_token(&binary).map(|_| ()).map_err(|e| e.kind()), Err("structure"));
	}

	#[test]
	fn validation_failures_name_the_offending_field() {
		let engine = engine("s1");
		let envelope = engine
			.seal(br#"{"accessToken":"","userId":"u1","accessTokenExpiresAt":1}"#.to_vec())
			.expect("Sealing should succeed.");

		assert_eq!(
			engine.decrypt(&envelope),
			Err(CryptoError::Structure {
				path: "accessToken".into(),
				reason: TokenRecordBuilderError::EmptyAccessToken.to_string(),
			})
		);
	}

	#[test]
	fn structure_errors_do_not_echo_plaintext() {
		let engine = engine("s1");
		let envelope = engine
			.seal(br#"{"accessToken":42,"userId":"secret-user","accessTokenExpiresAt":1}"#.to_vec())
			.expect("Sealing should succeed.");
		let err = engine.decrypt(&envelope).expect_err("Invalid payload must fail.");

		assert_eq!(err.kind(), "structure");
		assert!(!err.to_string().contains("secret-user"));
		assert!(!err.to_string().contains("42"));
	}
}
