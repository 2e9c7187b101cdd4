// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Node annotations through which members advertise their tunnel identity.

use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;

pub const ANNOTATION_PREFIX: &str = "kwg-";
pub const PUBKEY_ANNOTATION: &str = "kwg-pubkey";
pub const LISTEN_PORT_ANNOTATION: &str = "kwg-listen-port";
pub const NETWORK_SEGMENT_ANNOTATION: &str = "kwg-net";
pub const ENDPOINT_ANNOTATION: &str = "kwg-endpoint";
/// Followed by a segment name, e.g. `kwg-endpoint-from/dc1`.
pub const ENDPOINT_FROM_PREFIX: &str = "kwg-endpoint-from/";

/// Value of a single annotation, empty when absent.
pub fn annotation<'a>(node: &'a Node, name: &str) -> &'a str {
	node
		.metadata
		.annotations
		.as_ref()
		.and_then(|anns| anns.get(name))
		.map(String::as_str)
		.unwrap_or("")
}

/// All annotations starting with `prefix`, keyed by the remainder of the name.
pub fn annotations_by_prefix(node: &Node, prefix: &str) -> BTreeMap<String, String> {
	let Some(anns) = node.metadata.annotations.as_ref() else {
		return BTreeMap::new();
	};

	anns
		.iter()
		.filter_map(|(k, v)| {
			k.strip_prefix(prefix)
				.filter(|rest| !rest.is_empty())
				.map(|rest| (rest.to_string(), v.clone()))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

	fn node_with(anns: &[(&str, &str)]) -> Node {
		Node {
			metadata: ObjectMeta {
				name: Some("n1".to_string()),
				annotations: Some(
					anns
						.iter()
						.map(|(k, v)| (k.to_string(), v.to_string()))
						.collect(),
				),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[test]
	fn missing_annotations_read_as_empty() {
		let node = Node::default();
		assert_eq!(annotation(&node, PUBKEY_ANNOTATION), "");
		assert!(annotations_by_prefix(&node, ENDPOINT_FROM_PREFIX).is_empty());
	}

	#[test]
	fn prefix_lookup_strips_prefix() {
		let node = node_with(&[
			("kwg-endpoint-from/dc1", "10.0.0.1:51820"),
			("kwg-endpoint-from/", "ignored"),
			("kwg-endpoint", "192.0.2.1:51820"),
			("unrelated", "x"),
		]);

		let by_segment = annotations_by_prefix(&node, ENDPOINT_FROM_PREFIX);
		assert_eq!(by_segment.len(), 1);
		assert_eq!(by_segment["dc1"], "10.0.0.1:51820");
		assert_eq!(annotation(&node, ENDPOINT_ANNOTATION), "192.0.2.1:51820");
	}
}
