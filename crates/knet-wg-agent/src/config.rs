// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::ConfigError;
use clap::Parser;
use knet_wg_common::DEFAULT_LISTEN_PORT;
use std::path::PathBuf;

/// Kernel limit on interface name length (IFNAMSIZ minus the terminator).
const MAX_IFNAME_LEN: usize = 15;

#[derive(Debug, Clone, Parser)]
#[command(
	name = "knet-wg",
	version,
	about = "Maintains a full-mesh WireGuard overlay between cluster nodes"
)]
pub struct Args {
	/// WireGuard interface name.
	#[arg(long, env = "KNET_WG_IFNAME", default_value = "kwg")]
	pub ifname: String,

	/// Path to the node's private key; generated when missing.
	#[arg(long, env = "KNET_WG_KEY_PATH", default_value = "wg.key")]
	pub key_path: PathBuf,

	/// WireGuard configuration to write.
	#[arg(
		long = "config",
		env = "KNET_WG_CONFIG",
		default_value = "/etc/wireguard/kwg.cfg"
	)]
	pub config_path: PathBuf,

	/// Name of the node this agent runs on. Defaults to the hostname.
	#[arg(long, env = "NODE_NAME")]
	pub node_name: Option<String>,

	/// Listen port used when this node's own record is not yet known.
	#[arg(long, env = "KNET_WG_LISTEN_PORT", default_value_t = DEFAULT_LISTEN_PORT)]
	pub listen_port: u16,

	/// CNI configuration to write at startup; empty disables it.
	#[arg(
		long = "cni-config",
		env = "KNET_WG_CNI_CONFIG",
		default_value = "/etc/cni/net.d/10-knet.json"
	)]
	pub cni_path: String,

	/// Comma-separated nameservers for the CNI configuration.
	#[arg(long, env = "KNET_WG_CNI_DNS", default_value = "8.8.8.8")]
	pub cni_dns: String,

	/// Enable the nftables masquerade rules for pod traffic.
	#[arg(long, env = "KNET_WG_NFT")]
	pub nft: bool,

	/// Output interface match to masquerade (ie: "eth0", "{eth0, eth1}").
	#[arg(long, env = "KNET_WG_NFT_MASQ_OIF", default_value = "eth0")]
	pub nft_masq_oif: String,

	/// Emit logs as JSON.
	#[arg(long, env = "KNET_WG_LOG_JSON")]
	pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatConfig {
	pub masquerade_oif: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CniConfig {
	pub path: PathBuf,
	pub nameservers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
	pub node_name: String,
	pub interface: String,
	pub key_path: PathBuf,
	pub config_path: PathBuf,
	pub default_listen_port: u16,
	pub cni: Option<CniConfig>,
	pub nat: Option<NatConfig>,
	pub log_json: bool,
}

impl AgentConfig {
	pub fn from_args(args: Args) -> Result<Self, ConfigError> {
		let node_name = match args.node_name.filter(|n| !n.trim().is_empty()) {
			Some(name) => name.trim().to_string(),
			None => system_hostname().ok_or(ConfigError::NoNodeName)?,
		};

		Self::new(node_name, args.ifname)?.with_args(
			args.key_path,
			args.config_path,
			args.listen_port,
			&args.cni_path,
			&args.cni_dns,
			args.nft.then_some(args.nft_masq_oif),
			args.log_json,
		)
	}

	/// Configuration with the stock paths, no CNI file and NAT disabled.
	pub fn new(node_name: impl Into<String>, interface: impl Into<String>) -> Result<Self, ConfigError> {
		let interface = interface.into();
		validate_interface(&interface)?;

		Ok(Self {
			node_name: node_name.into(),
			interface,
			key_path: PathBuf::from("wg.key"),
			config_path: PathBuf::from("/etc/wireguard/kwg.cfg"),
			default_listen_port: DEFAULT_LISTEN_PORT,
			cni: None,
			nat: None,
			log_json: false,
		})
	}

	#[allow(clippy::too_many_arguments)]
	fn with_args(
		mut self,
		key_path: PathBuf,
		config_path: PathBuf,
		listen_port: u16,
		cni_path: &str,
		cni_dns: &str,
		nat_oif: Option<String>,
		log_json: bool,
	) -> Result<Self, ConfigError> {
		if listen_port == 0 {
			return Err(ConfigError::InvalidValue {
				name: "listen-port".into(),
				message: "must be between 1 and 65535".into(),
			});
		}

		self.cni = if cni_path.is_empty() {
			None
		} else {
			let nameservers: Vec<String> = cni_dns
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect();
			Some(CniConfig {
				path: PathBuf::from(cni_path),
				nameservers,
			})
		};

		self.nat = match nat_oif {
			Some(oif) if oif.trim().is_empty() => {
				return Err(ConfigError::InvalidValue {
					name: "nft-masq-oif".into(),
					message: "must not be empty when --nft is set".into(),
				});
			}
			Some(oif) => Some(NatConfig {
				masquerade_oif: oif.trim().to_string(),
			}),
			None => None,
		};

		self.key_path = key_path;
		self.config_path = config_path;
		self.default_listen_port = listen_port;
		self.log_json = log_json;
		Ok(self)
	}
}

fn validate_interface(name: &str) -> Result<(), ConfigError> {
	if name.is_empty() || name.len() > MAX_IFNAME_LEN {
		return Err(ConfigError::InvalidValue {
			name: "ifname".into(),
			message: format!("must be 1 to {MAX_IFNAME_LEN} bytes, got {:?}", name),
		});
	}
	if name.contains('/') || name.chars().any(char::is_whitespace) {
		return Err(ConfigError::InvalidValue {
			name: "ifname".into(),
			message: format!("{name:?} is not a valid interface name"),
		});
	}
	Ok(())
}

fn system_hostname() -> Option<String> {
	hostname::get()
		.ok()
		.map(|h| h.to_string_lossy().trim().to_string())
		.filter(|h| !h.is_empty())
}
