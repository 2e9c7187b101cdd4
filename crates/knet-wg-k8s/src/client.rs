// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Node;

use crate::error::K8sError;
use crate::event::NodeEvent;

/// Stream of membership changes delivered by [`NodeClient::watch_nodes`].
pub type NodeEventStream = BoxStream<'static, Result<NodeEvent, K8sError>>;

/// Cluster operations the mesh agent needs.
///
/// Kept behind a trait so the dispatcher and the key publication logic can be
/// exercised without a cluster.
#[async_trait]
pub trait NodeClient: Send + Sync {
	/// Fetch a node by name.
	async fn get_node(&self, name: &str) -> Result<Node, K8sError>;

	/// Set a single annotation on a node, leaving the others untouched.
	async fn patch_node_annotation(&self, name: &str, key: &str, value: &str)
		-> Result<(), K8sError>;

	/// Subscribe to add/update/delete notifications for every node.
	fn watch_nodes(&self) -> NodeEventStream;
}
