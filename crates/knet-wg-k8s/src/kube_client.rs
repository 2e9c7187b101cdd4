// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use tracing::{debug, instrument};

use crate::client::{NodeClient, NodeEventStream};
use crate::error::K8sError;
use crate::event::fold_watch_event;

/// Production node client backed by the kube crate.
pub struct KubeNodeClient {
	client: Client,
}

impl KubeNodeClient {
	/// Create a client that auto-discovers cluster configuration.
	///
	/// Tries the in-cluster service account first, then `KUBECONFIG`, then
	/// `~/.kube/config`.
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default()
			.await
			.map_err(|e| K8sError::ClientConfig {
				message: e.to_string(),
			})?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	pub fn from_client(client: Client) -> Self {
		Self { client }
	}

	fn nodes(&self) -> Api<Node> {
		Api::all(self.client.clone())
	}
}

#[async_trait]
impl NodeClient for KubeNodeClient {
	async fn get_node(&self, name: &str) -> Result<Node, K8sError> {
		match self.nodes().get(name).await {
			Ok(node) => Ok(node),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NodeNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, value), fields(node = %name, annotation = %key))]
	async fn patch_node_annotation(
		&self,
		name: &str,
		key: &str,
		value: &str,
	) -> Result<(), K8sError> {
		let patch = serde_json::json!({
			"metadata": {
				"annotations": { key: value }
			}
		});

		match self
			.nodes()
			.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
			.await
		{
			Ok(_) => {
				debug!("node annotation patched");
				Ok(())
			}
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NodeNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	fn watch_nodes(&self) -> NodeEventStream {
		watcher(self.nodes(), watcher::Config::default())
			.default_backoff()
			.scan(None::<Vec<Node>>, |pending, event| {
				let folded = match event {
					Ok(event) => fold_watch_event(pending, event).map(Ok),
					Err(e) => Some(Err(K8sError::from(e))),
				};
				future::ready(Some(folded))
			})
			.filter_map(future::ready)
			.boxed()
	}
}
