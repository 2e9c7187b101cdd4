// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Turns a `Node` object into the [`NodeDescriptor`] the agent works with.

use k8s_openapi::api::core::v1::Node;
use knet_wg_common::{NodeDescriptor, DEFAULT_NETWORK_SEGMENT};
use std::net::IpAddr;
use tracing::warn;

use crate::annotations::{
	annotation, annotations_by_prefix, ENDPOINT_ANNOTATION, ENDPOINT_FROM_PREFIX,
	LISTEN_PORT_ANNOTATION, NETWORK_SEGMENT_ANNOTATION, PUBKEY_ANNOTATION,
};
use crate::error::{K8sError, K8sResult};

pub fn node_name(node: &Node) -> K8sResult<&str> {
	node
		.metadata
		.name
		.as_deref()
		.filter(|n| !n.is_empty())
		.ok_or_else(|| K8sError::InvalidNode {
			message: "node has no name".into(),
		})
}

/// Pod ranges in declaration order, falling back to the legacy single
/// `podCIDR` field when `podCIDRs` is unset.
pub fn pod_cidrs(node: &Node) -> Vec<String> {
	let Some(spec) = node.spec.as_ref() else {
		return Vec::new();
	};

	match spec.pod_cidrs.as_ref().filter(|c| !c.is_empty()) {
		Some(cidrs) => cidrs.clone(),
		None => spec.pod_cidr.iter().cloned().collect(),
	}
}

fn reachable_ips(node: &Node) -> Vec<IpAddr> {
	node
		.status
		.as_ref()
		.and_then(|s| s.addresses.as_ref())
		.map(|addrs| {
			addrs
				.iter()
				.filter_map(|a| a.address.parse::<IpAddr>().ok())
				.collect()
		})
		.unwrap_or_default()
}

fn listen_port(node: &Node, name: &str, default_port: u16) -> u16 {
	let raw = annotation(node, LISTEN_PORT_ANNOTATION);
	if raw.is_empty() {
		return default_port;
	}

	match raw.trim().parse::<u16>() {
		Ok(port) if port != 0 => port,
		_ => {
			warn!(node = %name, value = %raw, "ignoring invalid listen port annotation");
			default_port
		}
	}
}

/// Builds the canonical descriptor for `node`.
///
/// `default_port` is the listen port of nodes without a usable
/// `kwg-listen-port` annotation. Pod ranges are carried verbatim; they are
/// parsed where they are used so a bad range only affects the step that needs
/// it.
pub fn node_descriptor(node: &Node, default_port: u16) -> K8sResult<NodeDescriptor> {
	let name = node_name(node)?;

	let segment = annotation(node, NETWORK_SEGMENT_ANNOTATION);
	let explicit = annotation(node, ENDPOINT_ANNOTATION);

	Ok(NodeDescriptor {
		name: name.to_string(),
		listen_port: listen_port(node, name, default_port),
		network_segment: if segment.is_empty() {
			DEFAULT_NETWORK_SEGMENT.to_string()
		} else {
			segment.to_string()
		},
		public_key: annotation(node, PUBKEY_ANNOTATION).to_string(),
		pod_cidrs: pod_cidrs(node),
		reachable_ips: reachable_ips(node),
		explicit_endpoint: (!explicit.is_empty()).then(|| explicit.to_string()),
		endpoints_by_segment: annotations_by_prefix(node, ENDPOINT_FROM_PREFIX),
	})
}


#[cfg(test)]
mod tests {
	use super::test_nodes::node;
	use super::*;
	use k8s_openapi::api::core::v1::NodeSpec;
	use knet_wg_common::DEFAULT_LISTEN_PORT;

	#[test]
	fn builds_descriptor_from_annotations() {
		let n = node(
			"node-a",
			&[
				("kwg-pubkey", "kA"),
				("kwg-listen-port", "51900"),
				("kwg-net", "dc1"),
				("kwg-endpoint", "203.0.113.1:51900"),
				("kwg-endpoint-from/dc2", "198.51.100.1:61000"),
			],
			&["10.0.1.0/24", "fd00:1::/64"],
			&["not-an-ip", "192.0.2.1", "2001:db8::1"],
		);

		let d = node_descriptor(&n, DEFAULT_LISTEN_PORT).unwrap();
		assert_eq!(d.name, "node-a");
		assert_eq!(d.public_key, "kA");
		assert_eq!(d.listen_port, 51900);
		assert_eq!(d.network_segment, "dc1");
		assert_eq!(d.explicit_endpoint.as_deref(), Some("203.0.113.1:51900"));
		assert_eq!(d.endpoints_by_segment["dc2"], "198.51.100.1:61000");
		assert_eq!(d.pod_cidrs, vec!["10.0.1.0/24", "fd00:1::/64"]);
		assert_eq!(d.primary_ip(), Some("192.0.2.1".parse().unwrap()));
		assert_eq!(d.reachable_ips.len(), 2);
	}

	#[test]
	fn defaults_apply_without_annotations() {
		let d = node_descriptor(
			&node("node-b", &[], &["10.0.2.0/24"], &["192.0.2.2"]),
			DEFAULT_LISTEN_PORT,
		)
		.unwrap();
		assert_eq!(d.listen_port, DEFAULT_LISTEN_PORT);
		assert_eq!(d.network_segment, DEFAULT_NETWORK_SEGMENT);
		assert!(d.public_key.is_empty());
		assert!(d.explicit_endpoint.is_none());
		assert!(d.endpoints_by_segment.is_empty());
	}

	#[test]
	fn invalid_listen_port_falls_back_to_default() {
		for bad in ["0", "70000", "abc"] {
			let d = node_descriptor(&node("n", &[("kwg-listen-port", bad)], &[], &[]), 4500).unwrap();
			assert_eq!(d.listen_port, 4500, "value {bad}");
		}
	}

	#[test]
	fn configured_default_port_applies_without_annotation() {
		let d = node_descriptor(&node("n", &[], &[], &["192.0.2.7"]), 4500).unwrap();
		assert_eq!(d.listen_port, 4500);
		assert_eq!(d.resolve_endpoint(DEFAULT_NETWORK_SEGMENT), "192.0.2.7:4500");

		let annotated = node_descriptor(&node("n", &[("kwg-listen-port", "51900")], &[], &[]), 4500).unwrap();
		assert_eq!(annotated.listen_port, 51900);
	}

	#[test]
	fn legacy_pod_cidr_is_used_when_list_is_empty() {
		let mut n = node("n", &[], &[], &[]);
		n.spec = Some(NodeSpec {
			pod_cidr: Some("10.0.9.0/24".to_string()),
			pod_cidrs: Some(Vec::new()),
			..Default::default()
		});
		assert_eq!(pod_cidrs(&n), vec!["10.0.9.0/24"]);
	}

	#[test]
	fn nameless_node_is_rejected() {
		let mut n = node("x", &[], &[], &[]);
		n.metadata.name = None;
		assert!(matches!(
			node_descriptor(&n, DEFAULT_LISTEN_PORT),
			Err(K8sError::InvalidNode { .. })
		));
	}
}
