// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CNI `ptp` plugin configuration handing out addresses from the node's pod
//! ranges.

use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

pub const CNI_VERSION: &str = "0.3.1";
pub const CNI_NETWORK_NAME: &str = "knet-wg";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CniNetwork {
	pub cni_version: &'static str,
	pub name: &'static str,
	#[serde(rename = "type")]
	pub plugin: &'static str,
	pub ipam: Ipam,
	pub dns: Dns,
	pub mtu: u32,
}

#[derive(Debug, Serialize)]
pub struct Ipam {
	#[serde(rename = "type")]
	pub plugin: &'static str,
	pub ranges: Vec<Vec<Subnet>>,
	pub routes: Vec<Route>,
}

#[derive(Debug, Serialize)]
pub struct Subnet {
	pub subnet: String,
}

#[derive(Debug, Serialize)]
pub struct Route {
	pub dst: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Dns {
	pub nameservers: Vec<String>,
}

impl CniNetwork {
	pub fn new(pod_cidrs: &[String], nameservers: &[String], mtu: u32) -> Self {
		Self {
			cni_version: CNI_VERSION,
			name: CNI_NETWORK_NAME,
			plugin: "ptp",
			ipam: Ipam {
				plugin: "host-local",
				ranges: pod_cidrs
					.iter()
					.map(|cidr| {
						vec![Subnet {
							subnet: cidr.clone(),
						}]
					})
					.collect(),
				routes: vec![Route { dst: "0.0.0.0/0" }],
			},
			dns: Dns {
				nameservers: nameservers.to_vec(),
			},
			mtu,
		}
	}

	pub fn to_json(&self) -> String {
		// Only strings, integers and sequences: serialization cannot fail.
		serde_json::to_string_pretty(self).unwrap_or_default()
	}
}

#[instrument(skip(network), fields(path = %path.display()))]
pub async fn write_cni_config(path: &Path, network: &CniNetwork) -> std::io::Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(parent).await?;
	}

	info!("writing CNI config");
	tokio::fs::write(path, network.to_json()).await?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
	}

	Ok(())
}
