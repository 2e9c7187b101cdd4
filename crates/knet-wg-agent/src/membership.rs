// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use knet_wg_common::NodeDescriptor;
use std::collections::BTreeMap;

/// Cluster-wide view: member name to its current descriptor.
///
/// Entries are replaced whole; nothing is ever updated in place.
#[derive(Debug, Default)]
pub struct MembershipStore {
	nodes: BTreeMap<String, NodeDescriptor>,
}

impl MembershipStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn upsert(&mut self, descriptor: NodeDescriptor) -> Option<NodeDescriptor> {
		self.nodes.insert(descriptor.name.clone(), descriptor)
	}

	pub fn remove(&mut self, name: &str) -> Option<NodeDescriptor> {
		self.nodes.remove(name)
	}

	pub fn get(&self, name: &str) -> Option<&NodeDescriptor> {
		self.nodes.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.nodes.contains_key(name)
	}

	/// Every member other than `local`, in name order.
	pub fn peers_of<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a NodeDescriptor> + 'a {
		self.nodes.values().filter(move |d| d.name != local)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.nodes.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn upsert_replaces_whole_descriptor() {
		let mut store = MembershipStore::new();
		let mut a = NodeDescriptor::new("a");
		a.pod_cidrs = vec!["10.0.1.0/24".into()];
		store.upsert(a);

		let replaced = store.upsert(NodeDescriptor::new("a")).unwrap();
		assert_eq!(replaced.pod_cidrs, vec!["10.0.1.0/24"]);
		assert!(store.get("a").unwrap().pod_cidrs.is_empty());
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn peers_exclude_local_node() {
		let mut store = MembershipStore::new();
		for name in ["c", "a", "b"] {
			store.upsert(NodeDescriptor::new(name));
		}

		let peers: Vec<_> = store.peers_of("b").map(|d| d.name.as_str()).collect();
		assert_eq!(peers, vec!["a", "c"]);
	}

	#[test]
	fn remove_drops_entry() {
		let mut store = MembershipStore::new();
		store.upsert(NodeDescriptor::new("a"));
		assert!(store.remove("a").is_some());
		assert!(store.remove("a").is_none());
		assert!(store.is_empty());
	}
}
