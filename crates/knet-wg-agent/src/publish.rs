// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use knet_wg_common::WgPublicKey;
use knet_wg_k8s::annotations::{annotation, PUBKEY_ANNOTATION};
use knet_wg_k8s::{node_name, K8sError, Node, NodeClient};
use tracing::{debug, info, instrument};

/// Writes this node's public key to its annotation unless it already matches.
///
/// Returns whether a patch was sent.
#[instrument(skip_all, fields(node = node.metadata.name.as_deref().unwrap_or_default()))]
pub async fn publish_public_key(
	client: &dyn NodeClient,
	node: &Node,
	key: &WgPublicKey,
) -> Result<bool, K8sError> {
	let encoded = key.to_base64();
	if annotation(node, PUBKEY_ANNOTATION) == encoded {
		debug!("public key already published");
		return Ok(false);
	}

	let name = node_name(node)?;
	client
		.patch_node_annotation(name, PUBKEY_ANNOTATION, &encoded)
		.await?;
	info!(public_key = %encoded, "published public key");
	Ok(true)
}
