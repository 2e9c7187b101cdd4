// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::client::{NodeClient, NodeEventStream};
use crate::error::K8sError;
use crate::event::NodeEvent;

/// In-memory [`NodeClient`] for tests.
///
/// Nodes are held in a map; annotation patches are applied to it and recorded.
/// The watch replays the scripted events once and then ends.
#[derive(Clone, Default)]
pub struct MockNodeClient {
	nodes: Arc<Mutex<BTreeMap<String, Node>>>,
	patches: Arc<Mutex<Vec<(String, String, String)>>>,
	events: Arc<Mutex<Vec<NodeEvent>>>,
}

impl MockNodeClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_node(&self, node: Node) {
		let name = node.metadata.name.clone().unwrap_or_default();
		self.nodes.lock().unwrap().insert(name, node);
	}

	/// Queue an event for the next [`NodeClient::watch_nodes`] call.
	pub fn push_event(&self, event: NodeEvent) {
		self.events.lock().unwrap().push(event);
	}

	/// Every `(node, key, value)` patch applied so far.
	pub fn patches(&self) -> Vec<(String, String, String)> {
		self.patches.lock().unwrap().clone()
	}
}

#[async_trait]
impl NodeClient for MockNodeClient {
	async fn get_node(&self, name: &str) -> Result<Node, K8sError> {
		self
			.nodes
			.lock()
			.unwrap()
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::NodeNotFound { name: name.into() })
	}

	async fn patch_node_annotation(
		&self,
		name: &str,
		key: &str,
		value: &str,
	) -> Result<(), K8sError> {
		let mut nodes = self.nodes.lock().unwrap();
		let node = nodes
			.get_mut(name)
			.ok_or_else(|| K8sError::NodeNotFound { name: name.into() })?;
		node
			.metadata
			.annotations
			.get_or_insert_with(BTreeMap::new)
			.insert(key.to_string(), value.to_string());
		self
			.patches
			.lock()
			.unwrap()
			.push((name.to_string(), key.to_string(), value.to_string()));
		Ok(())
	}

	fn watch_nodes(&self) -> NodeEventStream {
		let events: Vec<_> = std::mem::take(&mut *self.events.lock().unwrap());
		futures::stream::iter(events.into_iter().map(Ok)).boxed()
	}
}
