// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher;

/// A change to cluster membership as seen by the node watch.
#[derive(Debug, Clone)]
pub enum NodeEvent {
	/// A node was added or modified.
	Applied(Node),
	/// A node was removed.
	Deleted(Node),
	/// The watch (re)listed every node. Nodes absent from the list are gone.
	Relisted(Vec<Node>),
}

/// Collapses the raw watcher protocol into [`NodeEvent`]s.
///
/// `pending` buffers the objects of an in-progress relist; the whole batch is
/// released as a single [`NodeEvent::Relisted`] once the watcher reports the
/// list complete.
pub fn fold_watch_event(pending: &mut Option<Vec<Node>>, event: watcher::Event<Node>) -> Option<NodeEvent> {
	match event {
		watcher::Event::Apply(node) => Some(NodeEvent::Applied(node)),
		watcher::Event::Delete(node) => Some(NodeEvent::Deleted(node)),
		watcher::Event::Init => {
			*pending = Some(Vec::new());
			None
		}
		watcher::Event::InitApply(node) => match pending.as_mut() {
			Some(batch) => {
				batch.push(node);
				None
			}
			None => Some(NodeEvent::Applied(node)),
		},
		watcher::Event::InitDone => pending.take().map(NodeEvent::Relisted),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::test_nodes::node;

	fn names(nodes: &[Node]) -> Vec<String> {
		nodes
			.iter()
			.map(|n| n.metadata.name.clone().unwrap_or_default())
			.collect()
	}

	#[test]
	fn relist_is_released_as_one_batch() {
		let mut pending = None;

		assert!(fold_watch_event(&mut pending, watcher::Event::Init).is_none());
		assert!(fold_watch_event(&mut pending, watcher::Event::InitApply(node("a", &[], &[], &[]))).is_none());
		assert!(fold_watch_event(&mut pending, watcher::Event::InitApply(node("b", &[], &[], &[]))).is_none());

		match fold_watch_event(&mut pending, watcher::Event::InitDone) {
			Some(NodeEvent::Relisted(nodes)) => assert_eq!(names(&nodes), vec!["a", "b"]),
			other => panic!("expected relist, got {other:?}"),
		}
		assert!(pending.is_none());
	}

	#[test]
	fn empty_relist_is_still_reported() {
		let mut pending = None;
		fold_watch_event(&mut pending, watcher::Event::Init);
		assert!(matches!(
			fold_watch_event(&mut pending, watcher::Event::InitDone),
			Some(NodeEvent::Relisted(nodes)) if nodes.is_empty()
		));
	}

	#[test]
	fn live_events_pass_through() {
		let mut pending = None;
		assert!(matches!(
			fold_watch_event(&mut pending, watcher::Event::Apply(node("a", &[], &[], &[]))),
			Some(NodeEvent::Applied(_))
		));
		assert!(matches!(
			fold_watch_event(&mut pending, watcher::Event::Delete(node("a", &[], &[], &[]))),
			Some(NodeEvent::Deleted(_))
		));
	}
}
