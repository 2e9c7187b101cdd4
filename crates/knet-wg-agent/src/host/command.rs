// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::{FirewallApplier, LinkManager, RouteManager, TunnelSync};
use crate::error::HostError;
use async_trait::async_trait;
use ipnet::IpNet;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Host implementation that shells out to iproute2, wireguard-tools and nft.
///
/// Commands are awaited without a timeout; a hung tool stalls reconciliation
/// until it exits.
#[derive(Debug, Clone, Default)]
pub struct CommandHost;

impl CommandHost {
	pub fn new() -> Self {
		Self
	}
}

fn describe(program: &str, args: &[&str]) -> String {
	std::iter::once(program)
		.chain(args.iter().copied())
		.collect::<Vec<_>>()
		.join(" ")
}

fn check(command: String, output: Output) -> Result<String, HostError> {
	if !output.status.success() {
		return Err(HostError::CommandFailed {
			command,
			status: output.status.to_string(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}
	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn run(program: &str, args: &[&str]) -> Result<String, HostError> {
	let command = describe(program, args);
	debug!(%command, "running");

	let output = Command::new(program)
		.args(args)
		.output()
		.await
		.map_err(|source| HostError::Spawn {
			program: program.to_string(),
			source,
		})?;

	check(command, output)
}

fn parse_json<T: for<'de> Deserialize<'de>>(command: &str, stdout: &str) -> Result<T, HostError> {
	serde_json::from_str(stdout).map_err(|e| HostError::Output {
		command: command.to_string(),
		message: e.to_string(),
	})
}

#[derive(Debug, Deserialize)]
struct IpLink {
	#[serde(default)]
	mtu: Option<u32>,
	#[serde(default)]
	addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
	local: IpAddr,
	prefixlen: u8,
}

#[derive(Debug, Deserialize)]
struct IpRoute {
	#[serde(default)]
	dev: Option<String>,
}

/// Addresses from `ip -j addr show` output.
fn parse_addresses(command: &str, stdout: &str) -> Result<Vec<IpNet>, HostError> {
	let links: Vec<IpLink> = parse_json(command, stdout)?;
	links
		.iter()
		.flat_map(|link| link.addr_info.iter())
		.map(|info| {
			IpNet::new(info.local, info.prefixlen).map_err(|e| HostError::Output {
				command: command.to_string(),
				message: e.to_string(),
			})
		})
		.collect()
}

/// Outgoing device from `ip -j route get` output.
fn parse_route_device(command: &str, stdout: &str) -> Result<Option<String>, HostError> {
	let routes: Vec<IpRoute> = parse_json(command, stdout)?;
	Ok(routes.into_iter().find_map(|r| r.dev))
}

fn parse_mtu(command: &str, stdout: &str) -> Result<u32, HostError> {
	let links: Vec<IpLink> = parse_json(command, stdout)?;
	links
		.into_iter()
		.find_map(|l| l.mtu)
		.ok_or_else(|| HostError::Output {
			command: command.to_string(),
			message: "no mtu reported".into(),
		})
}

#[async_trait]
impl LinkManager for CommandHost {
	#[instrument(skip(self))]
	async fn ensure_link(&self, interface: &str) -> Result<(), HostError> {
		if run("ip", &["link", "show", "dev", interface]).await.is_err() {
			info!("creating interface");
			// Creation may race with another tool; bringing the link up below
			// is what decides success.
			if let Err(e) = run("ip", &["link", "add", interface, "type", "wireguard"]).await {
				warn!(error = %e, "failed to create interface");
			}
		}

		run("ip", &["link", "set", interface, "up"]).await?;
		Ok(())
	}

	async fn link_mtu(&self, interface: &str) -> Result<u32, HostError> {
		let args = ["-j", "link", "show", "dev", interface];
		let stdout = run("ip", &args).await?;
		parse_mtu(&describe("ip", &args), &stdout)
	}

	async fn link_addresses(&self, interface: &str) -> Result<Vec<IpNet>, HostError> {
		let args = ["-j", "addr", "show", "dev", interface];
		let stdout = run("ip", &args).await?;
		parse_addresses(&describe("ip", &args), &stdout)
	}

	#[instrument(skip(self, address), fields(%address))]
	async fn add_address(&self, interface: &str, address: IpNet) -> Result<(), HostError> {
		let address = address.to_string();
		match run("ip", &["addr", "add", address.as_str(), "dev", interface]).await {
			Err(HostError::CommandFailed { ref stderr, .. }) if stderr.contains("File exists") => {
				debug!("address already assigned");
				Ok(())
			}
			other => other.map(|_| ()),
		}
	}
}

#[async_trait]
impl RouteManager for CommandHost {
	async fn route_device(&self, destination: IpAddr) -> Result<Option<String>, HostError> {
		let destination = destination.to_string();
		let args = ["-j", "route", "get", destination.as_str()];
		let stdout = run("ip", &args).await?;
		parse_route_device(&describe("ip", &args), &stdout)
	}

	#[instrument(skip(self, destination), fields(%destination))]
	async fn add_route(&self, destination: IpNet, interface: &str) -> Result<(), HostError> {
		let destination = destination.to_string();
		run("ip", &["route", "add", destination.as_str(), "dev", interface]).await?;
		Ok(())
	}
}

#[async_trait]
impl TunnelSync for CommandHost {
	#[instrument(skip(self, path), fields(path = %path.display()))]
	async fn sync_config(&self, interface: &str, path: &Path) -> Result<(), HostError> {
		let path = path.to_string_lossy().into_owned();
		run("wg", &["syncconf", interface, path.as_str()]).await?;
		Ok(())
	}
}

#[async_trait]
impl FirewallApplier for CommandHost {
	#[instrument(skip_all)]
	async fn apply_ruleset(&self, script: &str) -> Result<(), HostError> {
		let command = "nft -f -".to_string();
		let spawn_err = |source| HostError::Spawn {
			program: "nft".into(),
			source,
		};

		let mut child = Command::new("nft")
			.args(["-f", "-"])
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(spawn_err)?;

		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(script.as_bytes()).await.map_err(spawn_err)?;
			// Dropping stdin closes the pipe so nft sees end of input.
		}

		let output = child.wait_with_output().await.map_err(spawn_err)?;
		check(command, output)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_interface_addresses() {
		let stdout = r#"[{"ifindex":5,"ifname":"kwg","mtu":1420,"addr_info":[
			{"family":"inet","local":"10.0.1.1","prefixlen":24,"scope":"global"},
			{"family":"inet6","local":"fd00:1::1","prefixlen":64,"scope":"global"}]}]"#;

		let addrs = parse_addresses("ip", stdout).unwrap();
		assert_eq!(
			addrs,
			vec![
				"10.0.1.1/24".parse::<IpNet>().unwrap(),
				"fd00:1::1/64".parse::<IpNet>().unwrap()
			]
		);
	}

	#[test]
	fn parses_interface_without_addresses() {
		let stdout = r#"[{"ifindex":5,"ifname":"kwg","mtu":1420}]"#;
		assert!(parse_addresses("ip", stdout).unwrap().is_empty());
		assert_eq!(parse_mtu("ip", stdout).unwrap(), 1420);
	}

	#[test]
	fn parses_route_device() {
		let stdout = r#"[{"dst":"10.0.2.0","dev":"kwg","prefsrc":"10.0.1.1","flags":[],"uid":0,"cache":[]}]"#;
		assert_eq!(
			parse_route_device("ip", stdout).unwrap().as_deref(),
			Some("kwg")
		);
	}

	#[test]
	fn unexpected_output_is_an_error() {
		assert!(matches!(
			parse_route_device("ip", "RTNETLINK answers: Network is unreachable"),
			Err(HostError::Output { .. })
		));
	}

	#[test]
	fn describes_command_line() {
		assert_eq!(
			describe("ip", &["route", "add", "10.0.2.0/24", "dev", "kwg"]),
			"ip route add 10.0.2.0/24 dev kwg"
		);
	}
}
