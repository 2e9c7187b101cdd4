// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Renders the `wg(8)` configuration for this node and its peers.
//!
//! Peers are always emitted in ascending name order: `wg syncconf` diffs the
//! text, so any other order would churn peers on every pass.

use knet_wg_common::{endpoint_has_host, NodeDescriptor, WgPrivateKey};
use std::fmt::{self, Write};
use tracing::debug;
use zeroize::Zeroizing;

/// A rendered configuration. Holds the private key, so it is zeroized on drop
/// and redacted in `Debug`.
pub struct RenderedConfig {
	text: Zeroizing<String>,
	peers: Vec<String>,
}

impl RenderedConfig {
	pub fn as_str(&self) -> &str {
		&self.text
	}

	/// Names of the members rendered as `[Peer]` sections, in output order.
	pub fn peers(&self) -> &[String] {
		&self.peers
	}
}

impl fmt::Debug for RenderedConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenderedConfig")
			.field("len", &self.text.len())
			.field("peers", &self.peers)
			.finish()
	}
}

/// Why a peer was left out of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSkip {
	NoPublicKey,
	NoEndpoint,
}

fn peer_section(peer: &NodeDescriptor, observer_segment: &str) -> Result<String, PeerSkip> {
	if !peer.has_public_key() {
		return Err(PeerSkip::NoPublicKey);
	}

	let endpoint = peer.resolve_endpoint(observer_segment);
	if !endpoint_has_host(&endpoint) {
		return Err(PeerSkip::NoEndpoint);
	}

	Ok(format!(
		"\n[Peer]\n# Name: {}\nPublicKey = {}\nEndpoint = {}\nAllowedIPs = {}\n",
		peer.name,
		peer.public_key,
		endpoint,
		peer.pod_cidrs.join(", "),
	))
}

/// Renders the interface section for `local` followed by one section per
/// usable peer.
///
/// `local` is `None` while this node's own record has not been observed yet;
/// the interface then listens on `default_port` and endpoints are resolved for
/// the default segment.
pub fn render_config<'a>(
	local: Option<&NodeDescriptor>,
	default_port: u16,
	private_key: &WgPrivateKey,
	peers: impl IntoIterator<Item = &'a NodeDescriptor>,
) -> RenderedConfig {
	let mut peers: Vec<&NodeDescriptor> = peers.into_iter().collect();
	peers.sort_by(|a, b| a.name.cmp(&b.name));

	let listen_port = local.map(|d| d.listen_port).unwrap_or(default_port);
	let segment = local
		.map(|d| d.network_segment.as_str())
		.unwrap_or(knet_wg_common::DEFAULT_NETWORK_SEGMENT);

	// Written in place so the key never lands in an unzeroized buffer. Writing
	// to a String cannot fail.
	let mut text = Zeroizing::new(String::new());
	let _ = write!(
		text,
		"[Interface]\nPrivateKey = {}\nListenPort = {}\n",
		private_key.to_base64().as_str(),
		listen_port
	);

	let mut rendered = Vec::with_capacity(peers.len());
	for peer in peers {
		match peer_section(peer, segment) {
			Ok(section) => {
				text.push_str(&section);
				rendered.push(peer.name.clone());
			}
			Err(reason) => debug!(peer = %peer.name, ?reason, "peer left out of config"),
		}
	}

	RenderedConfig {
		text,
		peers: rendered,
	}
}
