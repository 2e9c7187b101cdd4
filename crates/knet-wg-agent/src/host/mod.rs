// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Side effects on the local host.
//!
//! The reconciler only talks to these traits. [`CommandHost`] drives the real
//! `ip`, `wg` and `nft` tools; [`MockHost`] keeps an in-memory model and records
//! every mutation.

mod command;
mod mock;

pub use command::CommandHost;
pub use mock::{MockHost, Mutation};

use crate::error::HostError;
use async_trait::async_trait;
use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;

#[async_trait]
pub trait LinkManager: Send + Sync {
	/// Create the WireGuard link when it does not exist yet and bring it up.
	async fn ensure_link(&self, interface: &str) -> Result<(), HostError>;

	async fn link_mtu(&self, interface: &str) -> Result<u32, HostError>;

	/// Addresses currently assigned to `interface`, with their prefix length.
	async fn link_addresses(&self, interface: &str) -> Result<Vec<IpNet>, HostError>;

	async fn add_address(&self, interface: &str, address: IpNet) -> Result<(), HostError>;
}

#[async_trait]
pub trait RouteManager: Send + Sync {
	/// Device the kernel would use to reach `destination`, if any.
	async fn route_device(&self, destination: IpAddr) -> Result<Option<String>, HostError>;

	async fn add_route(&self, destination: IpNet, interface: &str) -> Result<(), HostError>;
}

#[async_trait]
pub trait TunnelSync: Send + Sync {
	/// Apply the configuration file at `path` to the running interface,
	/// changing only what differs.
	async fn sync_config(&self, interface: &str, path: &Path) -> Result<(), HostError>;
}

#[async_trait]
pub trait FirewallApplier: Send + Sync {
	/// Load an nftables script.
	async fn apply_ruleset(&self, script: &str) -> Result<(), HostError>;
}

/// Everything the reconciler needs from the host.
pub trait Host: LinkManager + RouteManager + TunnelSync + FirewallApplier {}

impl<T> Host for T where T: LinkManager + RouteManager + TunnelSync + FirewallApplier {}
