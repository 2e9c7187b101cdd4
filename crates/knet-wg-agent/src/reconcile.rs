// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The node-state reconciler.
//!
//! Owns the membership view and the change cache, renders the tunnel
//! configuration and converges the host towards it. A single worker drives it
//! through `&mut self`, so none of its state is locked.

use crate::config::{AgentConfig, NatConfig};
use crate::error::{LocalStateError, ReconcileError};
use crate::fingerprint::ChangeCache;
use crate::host::Host;
use crate::membership::MembershipStore;
use crate::nft::render_ruleset;
use crate::render::{render_config, RenderedConfig};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use knet_wg_common::{NodeDescriptor, WgKeyPair};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What a completed pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
	/// Members rendered as peers, in config order.
	pub peers: Vec<String>,
	pub addresses_added: Vec<IpNet>,
	pub routes_added: Vec<IpNet>,
	pub nat_applied: bool,
}

pub struct Reconciler {
	node_name: String,
	interface: String,
	config_path: PathBuf,
	default_listen_port: u16,
	nat: Option<NatConfig>,
	keypair: WgKeyPair,
	host: Arc<dyn Host>,
	cache: ChangeCache,
	store: MembershipStore,
	last_ruleset: Option<String>,
}

/// First address of `net` after the network address, keeping the prefix.
///
/// `10.1.2.0/24` gives `10.1.2.1/24`. `None` when that address falls outside
/// the range (a `/32` or `/128`).
pub fn first_host_address(net: IpNet) -> Option<IpNet> {
	let host = match net.trunc() {
		IpNet::V4(v4) => {
			let ip = Ipv4Addr::from(u32::from(v4.network()).checked_add(1)?);
			IpNet::V4(Ipv4Net::new(ip, v4.prefix_len()).ok()?)
		}
		IpNet::V6(v6) => {
			let ip = Ipv6Addr::from(u128::from(v6.network()).checked_add(1)?);
			IpNet::V6(Ipv6Net::new(ip, v6.prefix_len()).ok()?)
		}
	};
	net.contains(&host.addr()).then_some(host)
}

fn parse_ranges(ranges: &[String]) -> Result<Vec<IpNet>, LocalStateError> {
	ranges
		.iter()
		.map(|range| {
			range
				.trim()
				.parse::<IpNet>()
				.map(|net| net.trunc())
				.map_err(|source| LocalStateError::InvalidRange {
					range: range.clone(),
					source,
				})
		})
		.collect()
}

async fn write_config(path: &Path, config: &RenderedConfig) -> std::io::Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(parent).await?;
	}

	#[cfg(unix)]
	{
		use tokio::fs::OpenOptions;
		use tokio::io::AsyncWriteExt;

		let mut file = OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(0o600)
			.open(path)
			.await?;
		file.write_all(config.as_str().as_bytes()).await?;
		file.flush().await?;
	}

	#[cfg(not(unix))]
	{
		tokio::fs::write(path, config.as_str()).await?;
	}

	Ok(())
}

impl Reconciler {
	pub fn new(config: &AgentConfig, keypair: WgKeyPair, host: Arc<dyn Host>) -> Self {
		Self {
			node_name: config.node_name.clone(),
			interface: config.interface.clone(),
			config_path: config.config_path.clone(),
			default_listen_port: config.default_listen_port,
			nat: config.nat.clone(),
			keypair,
			host,
			cache: ChangeCache::new(),
			store: MembershipStore::new(),
			last_ruleset: None,
		}
	}

	pub fn node_name(&self) -> &str {
		&self.node_name
	}

	/// Listen port of nodes that do not announce one.
	pub fn default_listen_port(&self) -> u16 {
		self.default_listen_port
	}

	pub fn store(&self) -> &MembershipStore {
		&self.store
	}

	pub fn cache(&self) -> &ChangeCache {
		&self.cache
	}

	pub fn local(&self) -> Option<&NodeDescriptor> {
		self.store.get(&self.node_name)
	}

	/// Records a member's descriptor. Returns `false`, leaving everything
	/// untouched, when it matches what was last seen for that member.
	pub fn observe(&mut self, descriptor: NodeDescriptor) -> bool {
		if !self.cache.observe(&descriptor) {
			return false;
		}
		self.store.upsert(descriptor);
		true
	}

	/// Drops a member from the cache and the store. Returns whether it was known.
	pub fn forget(&mut self, name: &str) -> bool {
		let cached = self.cache.forget(name);
		let stored = self.store.remove(name).is_some();
		cached || stored
	}

	pub fn render(&self) -> RenderedConfig {
		let local = self.local();
		if local.is_none() {
			warn!(node = %self.node_name, "own node not observed yet, using default listen port");
		}

		render_config(
			local,
			self.default_listen_port,
			self.keypair.private_key(),
			self.store.peers_of(&self.node_name),
		)
	}

	/// One full pass: render, apply to the tunnel, then converge addresses,
	/// NAT and routes.
	///
	/// Only the tunnel steps can fail the pass. The later steps log their own
	/// failures and never undo an applied configuration.
	#[instrument(skip(self), fields(node = %self.node_name, members = self.store.len()))]
	pub async fn reconcile(&mut self) -> Result<PassReport, ReconcileError> {
		let config = self.render();

		write_config(&self.config_path, &config)
			.await
			.map_err(|source| ReconcileError::WriteConfig {
				path: self.config_path.clone(),
				source,
			})?;

		self
			.host
			.sync_config(&self.interface, &self.config_path)
			.await
			.map_err(ReconcileError::Sync)?;

		info!(peers = config.peers().len(), "applied tunnel config");

		let mut report = PassReport {
			peers: config.peers().to_vec(),
			..Default::default()
		};

		if let Some(local_cidrs) = self.local().map(|d| d.pod_cidrs.clone()) {
			match self.sync_local_addresses(&local_cidrs).await {
				Ok(added) => report.addresses_added = added,
				Err(e) => error!(error = %e, "local address sync failed"),
			}
			report.nat_applied = self.sync_nat(&local_cidrs).await;
		}

		report.routes_added = self.sync_routes().await;

		Ok(report)
	}

	/// Makes sure the interface holds one address inside each local range.
	///
	/// All ranges are parsed before anything is changed: one malformed range
	/// aborts the step without touching the interface.
	pub async fn sync_local_addresses(
		&self,
		pod_cidrs: &[String],
	) -> Result<Vec<IpNet>, LocalStateError> {
		let ranges = parse_ranges(pod_cidrs)?;
		let mut added = Vec::new();

		for range in ranges {
			let current = self.host.link_addresses(&self.interface).await?;
			if current.iter().any(|a| range.contains(&a.addr())) {
				continue;
			}

			let address = first_host_address(range).ok_or(LocalStateError::NoHostAddress(range))?;
			info!(%address, "adding interface address");
			self.host.add_address(&self.interface, address).await?;
			added.push(address);
		}

		Ok(added)
	}

	/// Routes every peer's ranges through the tunnel where the kernel would
	/// send them elsewhere. Existing routes via another device are left alone.
	pub async fn sync_routes(&self) -> Vec<IpNet> {
		let mut added = Vec::new();

		for peer in self.store.peers_of(&self.node_name) {
			for cidr in &peer.pod_cidrs {
				let range = match cidr.trim().parse::<IpNet>() {
					Ok(net) => net.trunc(),
					Err(e) => {
						warn!(peer = %peer.name, range = %cidr, error = %e, "skipping route for invalid range");
						continue;
					}
				};

				match self.host.route_device(range.network()).await {
					Ok(Some(dev)) if dev == self.interface => continue,
					Ok(_) => {}
					Err(e) => debug!(%range, error = %e, "route lookup failed, treating as missing"),
				}

				info!(peer = %peer.name, %range, "adding route");
				match self.host.add_route(range, &self.interface).await {
					Ok(()) => added.push(range),
					Err(e) => warn!(%range, error = %e, "failed to add route"),
				}
			}
		}

		added
	}

	/// Loads the masquerade ruleset when NAT is enabled and the ruleset differs
	/// from the last one applied. Returns whether a ruleset was loaded.
	pub async fn sync_nat(&mut self, pod_cidrs: &[String]) -> bool {
		let Some(nat) = self.nat.as_ref() else {
			return false;
		};

		let script = render_ruleset(&self.interface, pod_cidrs, &nat.masquerade_oif);
		if self.last_ruleset.as_deref() == Some(script.as_str()) {
			return false;
		}

		match self.host.apply_ruleset(&script).await {
			Ok(()) => {
				debug!("applied nft ruleset");
				self.last_ruleset = Some(script);
				true
			}
			Err(e) => {
				warn!(error = %e, "nft failed");
				false
			}
		}
	}
}

impl std::fmt::Debug for Reconciler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reconciler")
			.field("node_name", &self.node_name)
			.field("interface", &self.interface)
			.field("members", &self.store.len())
			.field("public_key", self.keypair.public_key())
			.finish()
	}
}
