// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster access for the knet-wg mesh agent.
//!
//! This crate provides:
//! - A trait-based node client abstraction for testability
//! - Production implementation using the kube crate
//! - Annotation parsing and the Node -> descriptor builder
//! - Folding of raw watch events into membership events

pub mod annotations;
mod client;
mod error;
mod event;
mod kube_client;
mod mock;
mod node;

pub use client::{NodeClient, NodeEventStream};
pub use error::{K8sError, K8sResult};
pub use event::{fold_watch_event, NodeEvent};
pub use kube_client::KubeNodeClient;
pub use mock::MockNodeClient;
pub use node::{node_descriptor, node_name, pod_cidrs};

pub use k8s_openapi::api::core::v1::Node;
