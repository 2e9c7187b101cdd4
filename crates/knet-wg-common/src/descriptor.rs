// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_NETWORK_SEGMENT: &str = "default";

/// Canonical snapshot of one cluster member's networking identity.
///
/// Field order and the ordered segment map make the serialized form stable,
/// which the change-detection fingerprint relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
	pub name: String,
	pub listen_port: u16,
	pub network_segment: String,
	/// Empty until the member has published its key.
	pub public_key: String,
	pub pod_cidrs: Vec<String>,
	pub reachable_ips: Vec<IpAddr>,
	pub explicit_endpoint: Option<String>,
	pub endpoints_by_segment: BTreeMap<String, String>,
}

impl NodeDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			listen_port: DEFAULT_LISTEN_PORT,
			network_segment: DEFAULT_NETWORK_SEGMENT.to_string(),
			public_key: String::new(),
			pod_cidrs: Vec::new(),
			reachable_ips: Vec::new(),
			explicit_endpoint: None,
			endpoints_by_segment: BTreeMap::new(),
		}
	}

	pub fn primary_ip(&self) -> Option<IpAddr> {
		self.reachable_ips.first().copied()
	}

	pub fn has_public_key(&self) -> bool {
		!self.public_key.is_empty()
	}

	/// Address a member in `observer_segment` should connect to.
	///
	/// A per-segment override wins over the explicit endpoint, which wins over
	/// `primary_ip:listen_port`. Never fails: without a reachable IP the host
	/// part is empty, see [`endpoint_has_host`].
	pub fn resolve_endpoint(&self, observer_segment: &str) -> String {
		if let Some(endpoint) = self.endpoints_by_segment.get(observer_segment) {
			return endpoint.clone();
		}

		if let Some(endpoint) = self.explicit_endpoint.as_ref().filter(|e| !e.is_empty()) {
			return endpoint.clone();
		}

		match self.primary_ip() {
			Some(ip) => SocketAddr::new(ip, self.listen_port).to_string(),
			None => format!(":{}", self.listen_port),
		}
	}
}

/// Whether an `host:port` endpoint string names a host at all.
pub fn endpoint_has_host(endpoint: &str) -> bool {
	let host = match endpoint.rsplit_once(':') {
		Some((host, _port)) => host,
		None => endpoint,
	};
	!host.trim_start_matches('[').trim_end_matches(']').is_empty()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn peer() -> NodeDescriptor {
		let mut peer = NodeDescriptor::new("node-b");
		peer.reachable_ips = vec!["192.0.2.2".parse().unwrap(), "198.51.100.2".parse().unwrap()];
		peer
	}

	#[test]
	fn segment_override_wins_over_explicit_endpoint() {
		let mut peer = peer();
		peer.explicit_endpoint = Some("203.0.113.9:4000".to_string());
		peer
			.endpoints_by_segment
			.insert("dc1".to_string(), "10.9.9.9:5000".to_string());

		assert_eq!(peer.resolve_endpoint("dc1"), "10.9.9.9:5000");
		assert_eq!(peer.resolve_endpoint("dc2"), "203.0.113.9:4000");

		peer.explicit_endpoint = None;
		peer.endpoints_by_segment.clear();
		assert_eq!(peer.resolve_endpoint("dc1"), "192.0.2.2:51820");
	}

	#[test]
	fn empty_explicit_endpoint_is_ignored() {
		let mut peer = peer();
		peer.explicit_endpoint = Some(String::new());
		peer.listen_port = 4242;
		assert_eq!(peer.resolve_endpoint("default"), "192.0.2.2:4242");
	}

	#[test]
	fn ipv6_primary_is_bracketed() {
		let mut peer = NodeDescriptor::new("v6");
		peer.reachable_ips = vec!["2001:db8::2".parse().unwrap()];
		let endpoint = peer.resolve_endpoint("default");
		assert_eq!(endpoint, "[2001:db8::2]:51820");
		assert!(endpoint_has_host(&endpoint));
	}

	#[test]
	fn missing_ip_yields_empty_host() {
		let peer = NodeDescriptor::new("lonely");
		let endpoint = peer.resolve_endpoint("default");
		assert_eq!(endpoint, ":51820");
		assert!(!endpoint_has_host(&endpoint));
	}

	#[test]
	fn endpoint_host_detection() {
		assert!(endpoint_has_host("192.0.2.1:51820"));
		assert!(endpoint_has_host("gw.example.com:51820"));
		assert!(!endpoint_has_host(":51820"));
		assert!(!endpoint_has_host("[]:51820"));
		assert!(!endpoint_has_host(""));
	}
}
