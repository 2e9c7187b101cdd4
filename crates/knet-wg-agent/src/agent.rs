// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Agent lifecycle: identity, startup host preparation and the event loop.

use crate::cni::{write_cni_config, CniNetwork};
use crate::config::AgentConfig;
use crate::dispatch::Dispatcher;
use crate::error::{AgentError, Result};
use crate::host::Host;
use crate::publish::publish_public_key;
use crate::reconcile::Reconciler;
use crate::shutdown::Shutdown;
use knet_wg_common::load_or_create;
use knet_wg_k8s::{pod_cidrs, NodeClient};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct Agent {
	config: AgentConfig,
	client: Arc<dyn NodeClient>,
	host: Arc<dyn Host>,
}

impl Agent {
	pub fn new(config: AgentConfig, client: Arc<dyn NodeClient>, host: Arc<dyn Host>) -> Self {
		Self {
			config,
			client,
			host,
		}
	}

	/// Loads the identity, publishes it and prepares the host, then hands
	/// control to the dispatcher. Returns when shutdown is requested or on the
	/// first fatal error.
	pub async fn run(self, shutdown: Shutdown) -> Result<()> {
		let dispatcher = self.bootstrap().await?;
		self.serve(dispatcher, &shutdown).await
	}

	/// Everything up to, but excluding, the event loop.
	#[instrument(skip(self), fields(node = %self.config.node_name, interface = %self.config.interface))]
	pub async fn bootstrap(&self) -> Result<Dispatcher> {
		let config = &self.config;

		let keypair = load_or_create(&config.key_path).await?;
		info!(public_key = %keypair.public_key(), "loaded node identity");

		let node = self.client.get_node(&config.node_name).await?;
		publish_public_key(self.client.as_ref(), &node, keypair.public_key()).await?;

		self.host.ensure_link(&config.interface).await?;

		let local_cidrs = pod_cidrs(&node);
		let mut reconciler = Reconciler::new(config, keypair, self.host.clone());

		if let Err(e) = reconciler.sync_local_addresses(&local_cidrs).await {
			error!(error = %e, "local address sync failed");
		}

		if let Some(cni) = &config.cni {
			let mtu = self.host.link_mtu(&config.interface).await?;
			let network = CniNetwork::new(&local_cidrs, &cni.nameservers, mtu);
			write_cni_config(&cni.path, &network)
				.await
				.map_err(|source| AgentError::Cni {
					path: cni.path.clone(),
					source,
				})?;
		}

		reconciler.sync_nat(&local_cidrs).await;

		Ok(Dispatcher::new(reconciler))
	}

	async fn serve(&self, mut dispatcher: Dispatcher, shutdown: &Shutdown) -> Result<()> {
		let events = self.client.watch_nodes();
		info!("watching nodes");
		dispatcher.run(events, shutdown).await?;
		info!("dispatcher stopped");
		Ok(())
	}
}
