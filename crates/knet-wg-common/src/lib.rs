// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod descriptor;
pub mod keys;
pub mod keys_file;

pub use descriptor::{
	endpoint_has_host, NodeDescriptor, DEFAULT_LISTEN_PORT, DEFAULT_NETWORK_SEGMENT,
};
pub use keys::{KeyError, WgKeyPair, WgPrivateKey, WgPublicKey};
pub use keys_file::{load_or_create, load_wg_key_from_file, save_wg_key_to_file, KeyFileError};
