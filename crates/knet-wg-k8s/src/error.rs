// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur while talking to the cluster API.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("K8s client configuration error: {message}")]
	ClientConfig { message: String },

	#[error("Node not found: {name}")]
	NodeNotFound { name: String },

	#[error("Invalid node object: {message}")]
	InvalidNode { message: String },

	#[error("Node watch error: {message}")]
	WatchError { message: String },
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}

impl From<kube::runtime::watcher::Error> for K8sError {
	fn from(err: kube::runtime::watcher::Error) -> Self {
		K8sError::WatchError {
			message: err.to_string(),
		}
	}
}
