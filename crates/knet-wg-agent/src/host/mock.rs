// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::{FirewallApplier, LinkManager, RouteManager, TunnelSync};
use crate::error::HostError;
use async_trait::async_trait;
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A change the reconciler asked the host to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	LinkCreated(String),
	LinkUp(String),
	AddressAdded { interface: String, address: IpNet },
	RouteAdded { destination: IpNet, interface: String },
	ConfigSynced { interface: String, path: PathBuf },
	RulesetApplied(String),
}

#[derive(Debug, Default)]
struct LinkState {
	up: bool,
	addresses: Vec<IpNet>,
}

#[derive(Debug, Default)]
struct State {
	links: BTreeMap<String, LinkState>,
	routes: Vec<(IpNet, String)>,
	default_device: Option<String>,
	synced_configs: Vec<String>,
	mutations: Vec<Mutation>,
	fail_sync: bool,
	fail_firewall: bool,
	fail_route_lookup: bool,
}

/// In-memory host for tests.
///
/// Keeps a model of links, addresses and routes so repeated passes observe the
/// effects of earlier ones, and records every mutation in order.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
	state: Arc<Mutex<State>>,
}

fn failure(command: &str) -> HostError {
	HostError::CommandFailed {
		command: command.to_string(),
		status: "exit status: 1".to_string(),
		stderr: "injected failure".to_string(),
	}
}

impl MockHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Route used for destinations no recorded route covers.
	pub fn with_default_route(self, device: &str) -> Self {
		self.state.lock().unwrap().default_device = Some(device.to_string());
		self
	}

	pub fn with_address(self, interface: &str, address: IpNet) -> Self {
		self
			.state
			.lock()
			.unwrap()
			.links
			.entry(interface.to_string())
			.or_default()
			.addresses
			.push(address);
		self
	}

	pub fn with_route(self, destination: IpNet, device: &str) -> Self {
		self
			.state
			.lock()
			.unwrap()
			.routes
			.push((destination, device.to_string()));
		self
	}

	pub fn fail_sync(&self, fail: bool) {
		self.state.lock().unwrap().fail_sync = fail;
	}

	pub fn fail_firewall(&self, fail: bool) {
		self.state.lock().unwrap().fail_firewall = fail;
	}

	pub fn fail_route_lookup(&self, fail: bool) {
		self.state.lock().unwrap().fail_route_lookup = fail;
	}

	pub fn mutations(&self) -> Vec<Mutation> {
		self.state.lock().unwrap().mutations.clone()
	}

	pub fn clear_mutations(&self) {
		self.state.lock().unwrap().mutations.clear();
	}

	pub fn added_addresses(&self) -> Vec<IpNet> {
		self
			.mutations()
			.into_iter()
			.filter_map(|m| match m {
				Mutation::AddressAdded { address, .. } => Some(address),
				_ => None,
			})
			.collect()
	}

	pub fn added_routes(&self) -> Vec<IpNet> {
		self
			.mutations()
			.into_iter()
			.filter_map(|m| match m {
				Mutation::RouteAdded { destination, .. } => Some(destination),
				_ => None,
			})
			.collect()
	}

	pub fn applied_rulesets(&self) -> Vec<String> {
		self
			.mutations()
			.into_iter()
			.filter_map(|m| match m {
				Mutation::RulesetApplied(script) => Some(script),
				_ => None,
			})
			.collect()
	}

	/// Contents of the config file at each successful sync.
	pub fn synced_configs(&self) -> Vec<String> {
		self.state.lock().unwrap().synced_configs.clone()
	}

	pub fn is_up(&self, interface: &str) -> bool {
		self
			.state
			.lock()
			.unwrap()
			.links
			.get(interface)
			.is_some_and(|l| l.up)
	}
}

#[async_trait]
impl LinkManager for MockHost {
	async fn ensure_link(&self, interface: &str) -> Result<(), HostError> {
		let mut guard = self.state.lock().unwrap();
		let state = &mut *guard;
		if !state.links.contains_key(interface) {
			state.links.insert(interface.to_string(), LinkState::default());
			state
				.mutations
				.push(Mutation::LinkCreated(interface.to_string()));
		}
		if let Some(link) = state.links.get_mut(interface) {
			if !link.up {
				link.up = true;
				state.mutations.push(Mutation::LinkUp(interface.to_string()));
			}
		}
		Ok(())
	}

	async fn link_mtu(&self, interface: &str) -> Result<u32, HostError> {
		match self.state.lock().unwrap().links.contains_key(interface) {
			true => Ok(1420),
			false => Err(failure("ip -j link show")),
		}
	}

	async fn link_addresses(&self, interface: &str) -> Result<Vec<IpNet>, HostError> {
		Ok(self
			.state
			.lock()
			.unwrap()
			.links
			.get(interface)
			.map(|l| l.addresses.clone())
			.unwrap_or_default())
	}

	async fn add_address(&self, interface: &str, address: IpNet) -> Result<(), HostError> {
		let mut state = self.state.lock().unwrap();
		let link = state.links.entry(interface.to_string()).or_default();
		if !link.addresses.contains(&address) {
			link.addresses.push(address);
		}
		state.mutations.push(Mutation::AddressAdded {
			interface: interface.to_string(),
			address,
		});
		Ok(())
	}
}

#[async_trait]
impl RouteManager for MockHost {
	async fn route_device(&self, destination: IpAddr) -> Result<Option<String>, HostError> {
		let state = self.state.lock().unwrap();
		if state.fail_route_lookup {
			return Err(failure("ip -j route get"));
		}

		let best = state
			.routes
			.iter()
			.filter(|(net, _)| net.contains(&destination))
			.max_by_key(|(net, _)| net.prefix_len())
			.map(|(_, dev)| dev.clone());
		Ok(best.or_else(|| state.default_device.clone()))
	}

	async fn add_route(&self, destination: IpNet, interface: &str) -> Result<(), HostError> {
		let mut state = self.state.lock().unwrap();
		state.routes.push((destination, interface.to_string()));
		state.mutations.push(Mutation::RouteAdded {
			destination,
			interface: interface.to_string(),
		});
		Ok(())
	}
}

#[async_trait]
impl TunnelSync for MockHost {
	async fn sync_config(&self, interface: &str, path: &Path) -> Result<(), HostError> {
		if self.state.lock().unwrap().fail_sync {
			return Err(failure("wg syncconf"));
		}

		let contents = tokio::fs::read_to_string(path)
			.await
			.map_err(|source| HostError::Spawn {
				program: "wg".into(),
				source,
			})?;

		let mut state = self.state.lock().unwrap();
		state.synced_configs.push(contents);
		state.mutations.push(Mutation::ConfigSynced {
			interface: interface.to_string(),
			path: path.to_path_buf(),
		});
		Ok(())
	}
}

#[async_trait]
impl FirewallApplier for MockHost {
	async fn apply_ruleset(&self, script: &str) -> Result<(), HostError> {
		let mut state = self.state.lock().unwrap();
		if state.fail_firewall {
			return Err(failure("nft -f -"));
		}
		state
			.mutations
			.push(Mutation::RulesetApplied(script.to_string()));
		Ok(())
	}
}
