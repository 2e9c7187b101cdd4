// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! nftables masquerade ruleset for pod traffic.

pub const NFT_TABLE: &str = "knet_wg";

/// Script for `nft -f -` replacing the agent's table in one transaction.
///
/// The table is declared, deleted and declared again so the load works
/// whether or not a previous ruleset exists, and no rule from an older
/// ruleset survives.
pub fn render_ruleset(interface: &str, pod_cidrs: &[String], masquerade_oif: &str) -> String {
	let mut script = format!(
		"table ip {NFT_TABLE};\n\
		 delete table ip {NFT_TABLE};\n\
		 table ip {NFT_TABLE} {{\n\
		 \x20 chain hook_postrouting {{\n\
		 \x20   type nat hook postrouting priority 999;\n\
		 \x20   fib saddr type local oif \"{interface}\" masquerade;\n"
	);

	for cidr in pod_cidrs {
		script.push_str(&format!("    ip saddr {cidr} oif {masquerade_oif} masquerade;\n"));
	}

	script.push_str("  }\n}\n");
	script
}
