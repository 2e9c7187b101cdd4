// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use knet_wg_agent::{install_signal_handlers, Agent, AgentConfig, Args, CommandHost, Shutdown};
use knet_wg_k8s::KubeNodeClient;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(json.then(|| fmt::layer().json()))
		.with((!json).then(fmt::layer))
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(args.log_json);

	let config = AgentConfig::from_args(args)?;
	info!(
		node = %config.node_name,
		interface = %config.interface,
		config_path = %config.config_path.display(),
		nat = config.nat.is_some(),
		"Starting knet-wg"
	);

	let shutdown = Shutdown::new();
	let _signals = install_signal_handlers(shutdown.clone())?;

	let client = KubeNodeClient::new().await?;
	let agent = Agent::new(config, Arc::new(client), Arc::new(CommandHost::new()));
	agent.run(shutdown).await?;

	info!("knet-wg stopped");
	Ok(())
}
