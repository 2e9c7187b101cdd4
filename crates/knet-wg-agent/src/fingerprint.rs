// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Change detection for node descriptors.
//!
//! A fingerprint only decides whether a reconciliation pass can be skipped. It
//! is not a security property.

use knet_wg_common::NodeDescriptor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub type Fingerprint = u64;

/// 64-bit digest of the descriptor's canonical JSON form.
pub fn fingerprint(descriptor: &NodeDescriptor) -> Fingerprint {
	// Plain strings, integers and string-keyed ordered maps always serialize.
	let canonical = serde_json::to_vec(descriptor).expect("node descriptor serializes to JSON");
	let digest = Sha256::digest(&canonical);

	let mut prefix = [0u8; 8];
	prefix.copy_from_slice(&digest[..8]);
	u64::from_be_bytes(prefix)
}

/// Last seen fingerprint per member name.
#[derive(Debug, Default)]
pub struct ChangeCache {
	fingerprints: HashMap<String, Fingerprint>,
}

impl ChangeCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `descriptor` and reports whether it differs from the last one
	/// seen under the same name.
	pub fn observe(&mut self, descriptor: &NodeDescriptor) -> bool {
		let sum = fingerprint(descriptor);
		match self.fingerprints.insert(descriptor.name.clone(), sum) {
			Some(previous) => previous != sum,
			None => true,
		}
	}

	pub fn forget(&mut self, name: &str) -> bool {
		self.fingerprints.remove(name).is_some()
	}

	pub fn get(&self, name: &str) -> Option<Fingerprint> {
		self.fingerprints.get(name).copied()
	}

	pub fn len(&self) -> usize {
		self.fingerprints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fingerprints.is_empty()
	}
}
