// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serializes node notifications into reconciliation passes.

use crate::error::{AgentError, ReconcileError, Result};
use crate::reconcile::{PassReport, Reconciler};
use crate::shutdown::Shutdown;
use futures::StreamExt;
use knet_wg_common::NodeDescriptor;
use knet_wg_k8s::{node_descriptor, Node, NodeEvent, NodeEventStream};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Feeds node notifications to the [`Reconciler`] one at a time.
///
/// Every handler completes its pass before the next notification is looked
/// at, so passes never overlap.
#[derive(Debug)]
pub struct Dispatcher {
	reconciler: Reconciler,
}

fn describe(node: &Node, default_port: u16) -> Option<NodeDescriptor> {
	match node_descriptor(node, default_port) {
		Ok(descriptor) => Some(descriptor),
		Err(e) => {
			warn!(error = %e, "ignoring node notification");
			None
		}
	}
}

impl Dispatcher {
	pub fn new(reconciler: Reconciler) -> Self {
		Self { reconciler }
	}

	pub fn reconciler(&self) -> &Reconciler {
		&self.reconciler
	}

	pub fn into_reconciler(self) -> Reconciler {
		self.reconciler
	}

	/// Runs a pass when the node's descriptor changed. `None` means nothing
	/// changed and the host was left alone.
	pub async fn on_add(&mut self, node: &Node) -> std::result::Result<Option<PassReport>, ReconcileError> {
		let Some(descriptor) = describe(node, self.reconciler.default_listen_port()) else {
			return Ok(None);
		};

		let name = descriptor.name.clone();
		if !self.reconciler.observe(descriptor) {
			debug!(node = %name, "node unchanged");
			return Ok(None);
		}

		info!(node = %name, "node changed");
		self.reconciler.reconcile().await.map(Some)
	}

	pub async fn on_update(
		&mut self,
		_old: &Node,
		new: &Node,
	) -> std::result::Result<Option<PassReport>, ReconcileError> {
		self.on_add(new).await
	}

	/// Drops the node from the mesh and always runs a pass.
	pub async fn on_delete(&mut self, node: &Node) -> std::result::Result<Option<PassReport>, ReconcileError> {
		let Some(name) = node.metadata.name.as_deref().filter(|n| !n.is_empty()) else {
			warn!("ignoring deletion of nameless node");
			return Ok(None);
		};

		info!(node = %name, "node deleted");
		self.reconciler.forget(name);
		self.reconciler.reconcile().await.map(Some)
	}

	/// Replaces the membership with a full listing. Members missing from it
	/// are removed; a single pass runs when anything changed.
	pub async fn on_relist(&mut self, nodes: &[Node]) -> std::result::Result<Option<PassReport>, ReconcileError> {
		let mut changed = false;
		let mut seen = HashSet::new();

		let default_port = self.reconciler.default_listen_port();
		for descriptor in nodes.iter().filter_map(|n| describe(n, default_port)) {
			seen.insert(descriptor.name.clone());
			changed |= self.reconciler.observe(descriptor);
		}

		let vanished: Vec<String> = self
			.reconciler
			.store()
			.names()
			.filter(|name| !seen.contains(*name))
			.map(String::from)
			.collect();
		for name in &vanished {
			info!(node = %name, "node gone after relist");
			changed |= self.reconciler.forget(name);
		}

		if !changed {
			debug!(nodes = nodes.len(), "relist brought no changes");
			return Ok(None);
		}
		self.reconciler.reconcile().await.map(Some)
	}

	pub async fn handle(&mut self, event: NodeEvent) -> std::result::Result<Option<PassReport>, ReconcileError> {
		match event {
			NodeEvent::Applied(node) => self.on_add(&node).await,
			NodeEvent::Deleted(node) => self.on_delete(&node).await,
			NodeEvent::Relisted(nodes) => self.on_relist(&nodes).await,
		}
	}

	/// Processes notifications until shutdown is requested.
	///
	/// A failed pass ends the loop with its error. The event stream ending on
	/// its own is an error too: the agent would silently stop converging.
	pub async fn run(&mut self, mut events: NodeEventStream, shutdown: &Shutdown) -> Result<()> {
		loop {
			let event = tokio::select! {
				biased;
				_ = shutdown.requested() => {
					info!("shutdown requested, stopping node watch");
					return Ok(());
				}
				event = events.next() => event,
			};

			match event {
				Some(Ok(event)) => {
					self.handle(event).await?;
				}
				Some(Err(e)) => warn!(error = %e, "node watch error"),
				None => return Err(AgentError::WatchEnded),
			}
		}
	}
}
