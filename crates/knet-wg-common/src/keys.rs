// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Curve25519 key material in the textual form `wg(8)` reads and writes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyError {
	#[error("invalid key length: expected 32 bytes, got {0}")]
	InvalidLength(usize),

	#[error("invalid base64 encoding: {0}")]
	InvalidBase64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, KeyError>;

fn decode_key(s: &str) -> Result<[u8; KEY_LEN]> {
	let bytes = Zeroizing::new(STANDARD.decode(s.trim())?);
	if bytes.len() != KEY_LEN {
		return Err(KeyError::InvalidLength(bytes.len()));
	}
	let mut arr = [0u8; KEY_LEN];
	arr.copy_from_slice(&bytes);
	Ok(arr)
}

#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct WgPrivateKey {
	bytes: [u8; KEY_LEN],
}

impl WgPrivateKey {
	pub fn generate() -> Self {
		let secret = StaticSecret::random_from_rng(OsRng);
		Self {
			bytes: secret.to_bytes(),
		}
	}

	pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
		Self { bytes }
	}

	pub fn from_base64(s: &str) -> Result<Self> {
		Ok(Self {
			bytes: decode_key(s)?,
		})
	}

	/// Padded base64, the only form accepted in a `PrivateKey =` line.
	pub fn to_base64(&self) -> Zeroizing<String> {
		Zeroizing::new(STANDARD.encode(self.bytes))
	}

	pub fn public_key(&self) -> WgPublicKey {
		let secret = StaticSecret::from(self.bytes);
		let public = PublicKey::from(&secret);
		WgPublicKey {
			bytes: *public.as_bytes(),
		}
	}
}

impl fmt::Debug for WgPrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WgPrivateKey")
			.field("bytes", &"[REDACTED]")
			.finish()
	}
}

impl fmt::Display for WgPrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[REDACTED]")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgPublicKey {
	bytes: [u8; KEY_LEN],
}

impl WgPublicKey {
	pub fn from_base64(s: &str) -> Result<Self> {
		Ok(Self {
			bytes: decode_key(s)?,
		})
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(self.bytes)
	}

	pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
		&self.bytes
	}
}

impl fmt::Debug for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let b64 = self.to_base64();
		f.debug_struct("WgPublicKey")
			.field("prefix", &format!("{}...", &b64[..8]))
			.finish()
	}
}

impl fmt::Display for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_base64())
	}
}

/// The node's identity: a private key and the public key derived from it.
#[derive(Clone)]
pub struct WgKeyPair {
	private: WgPrivateKey,
	public: WgPublicKey,
}

impl WgKeyPair {
	pub fn generate() -> Self {
		Self::from_private_key(WgPrivateKey::generate())
	}

	pub fn from_private_key(private: WgPrivateKey) -> Self {
		let public = private.public_key();
		Self { private, public }
	}

	pub fn from_base64(private_key_base64: &str) -> Result<Self> {
		let private = WgPrivateKey::from_base64(private_key_base64)?;
		Ok(Self::from_private_key(private))
	}

	pub fn private_key(&self) -> &WgPrivateKey {
		&self.private
	}

	pub fn public_key(&self) -> &WgPublicKey {
		&self.public
	}
}

impl fmt::Debug for WgKeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WgKeyPair")
			.field("private", &self.private)
			.field("public", &self.public)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn encoded_keys_use_padded_base64() {
		let keypair = WgKeyPair::generate();
		let private = keypair.private_key().to_base64();
		assert_eq!(private.len(), 44);
		assert!(private.ends_with('='));
		assert_eq!(keypair.public_key().to_base64().len(), 44);
	}

	#[test]
	fn restores_public_key_from_private() {
		let keypair = WgKeyPair::generate();
		let restored = WgKeyPair::from_base64(&keypair.private_key().to_base64()).unwrap();
		assert_eq!(keypair.public_key(), restored.public_key());
	}

	#[test]
	fn tolerates_trailing_newline() {
		let keypair = WgKeyPair::generate();
		let line = format!("{}\n", keypair.private_key().to_base64().as_str());
		let restored = WgKeyPair::from_base64(&line).unwrap();
		assert_eq!(keypair.public_key(), restored.public_key());
	}

	#[test]
	fn rejects_short_key() {
		let err = WgPublicKey::from_base64("AAAA").unwrap_err();
		assert!(matches!(err, KeyError::InvalidLength(3)));
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(
			WgPrivateKey::from_base64("not a key!").unwrap_err(),
			KeyError::InvalidBase64(_)
		));
	}

	#[test]
	fn private_key_formatting_is_redacted() {
		let private = WgPrivateKey::generate();
		assert_eq!(format!("{}", private), "[REDACTED]");
		let debug = format!("{:?}", private);
		assert!(debug.contains("[REDACTED]"));
		assert!(!debug.contains(private.to_base64().as_str()));
	}

	proptest! {
		#[test]
		fn keypair_debug_never_leaks(seed in prop::array::uniform32(any::<u8>())) {
			let keypair = WgKeyPair::from_private_key(WgPrivateKey::from_bytes(seed));
			let debug = format!("{:?}", keypair);
			let encoded = STANDARD.encode(seed);
			prop_assert!(!debug.contains(&encoded));
		}
	}
}
