// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("node identity error: {0}")]
	Identity(#[from] knet_wg_common::KeyFileError),

	#[error("cluster error: {0}")]
	K8s(#[from] knet_wg_k8s::K8sError),

	#[error("host error: {0}")]
	Host(#[from] HostError),

	#[error("reconciliation failed: {0}")]
	Reconcile(#[from] ReconcileError),

	#[error("failed to write CNI config {path}: {source}")]
	Cni {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("node watch ended")]
	WatchEnded,
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },

	#[error("cannot determine node name: set --node-name or NODE_NAME")]
	NoNodeName,
}

/// Failure of an external host operation.
#[derive(Debug, Error)]
pub enum HostError {
	#[error("failed to run {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{command}` failed ({status}): {stderr}")]
	CommandFailed {
		command: String,
		status: String,
		stderr: String,
	},

	#[error("unexpected output from `{command}`: {message}")]
	Output { command: String, message: String },
}

/// Failures that end the process: the applied tunnel state would otherwise
/// diverge from the rendered configuration.
#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("failed to write tunnel config {path}: {source}")]
	WriteConfig {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to sync tunnel config: {0}")]
	Sync(#[source] HostError),
}

/// Failures of the best-effort local state steps. Logged, never fatal.
#[derive(Debug, Error)]
pub enum LocalStateError {
	#[error("invalid address range {range:?}: {source}")]
	InvalidRange {
		range: String,
		#[source]
		source: ipnet::AddrParseError,
	},

	#[error("no host address available in {0}")]
	NoHostAddress(ipnet::IpNet),

	#[error(transparent)]
	Host(#[from] HostError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
