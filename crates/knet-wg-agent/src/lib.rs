// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-node agent for a full-mesh WireGuard overlay.
//!
//! Watches cluster nodes, keeps one tunnel peer per remote node and converges
//! the local interface addresses, routes and masquerade rules.

pub mod agent;
pub mod cni;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod membership;
pub mod nft;
pub mod publish;
pub mod reconcile;
pub mod render;
pub mod shutdown;

pub use agent::Agent;
pub use config::{AgentConfig, Args, CniConfig, NatConfig};
pub use dispatch::Dispatcher;
pub use error::{AgentError, ConfigError, HostError, LocalStateError, ReconcileError, Result};
pub use fingerprint::{fingerprint, ChangeCache, Fingerprint};
pub use host::{CommandHost, Host, MockHost, Mutation};
pub use membership::MembershipStore;
pub use publish::publish_public_key;
pub use reconcile::{first_host_address, PassReport, Reconciler};
pub use render::{render_config, RenderedConfig};
pub use shutdown::{install_signal_handlers, Shutdown, Stage};
