// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::keys::WgKeyPair;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum KeyFileError {
	#[error("failed to access key file: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid key format: {0}")]
	InvalidFormat(#[from] crate::keys::KeyError),
}

pub type Result<T> = std::result::Result<T, KeyFileError>;

#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_wg_key_from_file(path: impl AsRef<Path>) -> Result<WgKeyPair> {
	let content = fs::read_to_string(path.as_ref()).await?;
	Ok(WgKeyPair::from_base64(content.trim())?)
}

#[instrument(skip(key), fields(path = %path.as_ref().display()))]
pub async fn save_wg_key_to_file(key: &WgKeyPair, path: impl AsRef<Path>) -> Result<()> {
	let path = path.as_ref();

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).await?;
	}

	let content = zeroize::Zeroizing::new(format!("{}\n", key.private_key().to_base64().as_str()));

	#[cfg(unix)]
	{
		use tokio::fs::OpenOptions;
		use tokio::io::AsyncWriteExt;

		let mut file = OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(0o600)
			.open(path)
			.await?;
		file.write_all(content.as_bytes()).await?;
		file.flush().await?;
	}

	#[cfg(not(unix))]
	{
		fs::write(path, content.as_bytes()).await?;
	}

	Ok(())
}

/// Loads the node key from `path`, generating and persisting one when the file
/// does not exist. A file that exists but does not parse is an error: the
/// caller must not continue with a different identity than the one published.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_or_create(path: impl AsRef<Path>) -> Result<WgKeyPair> {
	let path = path.as_ref();

	match load_wg_key_from_file(path).await {
		Ok(keypair) => {
			info!(public_key = %keypair.public_key(), "loaded node key");
			Ok(keypair)
		}
		Err(KeyFileError::Io(e)) if e.kind() == ErrorKind::NotFound => {
			let keypair = WgKeyPair::generate();
			save_wg_key_to_file(&keypair, path).await?;
			info!(public_key = %keypair.public_key(), "generated new node key");
			Ok(keypair)
		}
		Err(e) => Err(e),
	}
}
