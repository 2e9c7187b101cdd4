// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for agent startup and the watch loop.

use ipnet::IpNet;
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeSpec, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use knet_wg_agent::{
	Agent, AgentConfig, AgentError, CniConfig, MockHost, Mutation, NatConfig, Shutdown,
};
use knet_wg_common::{load_wg_key_from_file, KeyFileError};
use knet_wg_k8s::annotations::PUBKEY_ANNOTATION;
use knet_wg_k8s::{K8sError, MockNodeClient, NodeEvent};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn node(name: &str, annotations: &[(&str, &str)], cidr: &str, ip: &str) -> Node {
	Node {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			annotations: Some(
				annotations
					.iter()
					.map(|(k, v)| (k.to_string(), v.to_string()))
					.collect(),
			),
			..Default::default()
		},
		spec: Some(NodeSpec {
			pod_cidr: Some(cidr.to_string()),
			..Default::default()
		}),
		status: Some(NodeStatus {
			addresses: Some(vec![NodeAddress {
				address: ip.to_string(),
				type_: "InternalIP".to_string(),
			}]),
			..Default::default()
		}),
	}
}

fn config(dir: &Path) -> AgentConfig {
	let mut config = AgentConfig::new("a", "kwg").unwrap();
	config.key_path = dir.join("wg.key");
	config.config_path = dir.join("kwg.cfg");
	config.cni = Some(CniConfig {
		path: dir.join("net.d").join("10-knet.json"),
		nameservers: vec!["8.8.8.8".into()],
	});
	config.nat = Some(NatConfig {
		masquerade_oif: "eth0".into(),
	});
	config
}

#[tokio::test]
async fn bootstrap_prepares_identity_and_host() {
	let dir = tempdir().unwrap();
	let client = MockNodeClient::new();
	client.insert_node(node("a", &[], "10.0.1.0/24", "192.0.2.1"));
	let host = MockHost::new();

	let agent = Agent::new(
		config(dir.path()),
		Arc::new(client.clone()),
		Arc::new(host.clone()),
	);
	agent.bootstrap().await.unwrap();

	let keys = load_wg_key_from_file(dir.path().join("wg.key")).await.unwrap();
	assert_eq!(
		client.patches(),
		vec![(
			"a".to_string(),
			PUBKEY_ANNOTATION.to_string(),
			keys.public_key().to_base64()
		)]
	);

	assert!(host.is_up("kwg"));
	assert_eq!(
		host.added_addresses(),
		vec!["10.0.1.1/24".parse::<IpNet>().unwrap()]
	);
	assert_eq!(host.applied_rulesets().len(), 1);

	let cni: serde_json::Value = serde_json::from_str(
		&std::fs::read_to_string(dir.path().join("net.d").join("10-knet.json")).unwrap(),
	)
	.unwrap();
	assert_eq!(cni["mtu"], 1420);
	assert_eq!(cni["ipam"]["ranges"][0][0]["subnet"], "10.0.1.0/24");
}

#[tokio::test]
async fn bootstrap_skips_publication_when_key_matches() {
	let dir = tempdir().unwrap();
	let keys = knet_wg_common::load_or_create(dir.path().join("wg.key"))
		.await
		.unwrap();
	let published = keys.public_key().to_base64();

	let client = MockNodeClient::new();
	client.insert_node(node(
		"a",
		&[(PUBKEY_ANNOTATION, published.as_str())],
		"10.0.1.0/24",
		"192.0.2.1",
	));

	let agent = Agent::new(
		config(dir.path()),
		Arc::new(client.clone()),
		Arc::new(MockHost::new()),
	);
	agent.bootstrap().await.unwrap();

	assert!(client.patches().is_empty());
}

#[tokio::test]
async fn missing_own_node_is_fatal() {
	let dir = tempdir().unwrap();
	let host = MockHost::new();
	let agent = Agent::new(
		config(dir.path()),
		Arc::new(MockNodeClient::new()),
		Arc::new(host.clone()),
	);

	let err = agent.bootstrap().await.unwrap_err();
	assert!(matches!(
		err,
		AgentError::K8s(K8sError::NodeNotFound { .. })
	));
	assert!(host.mutations().is_empty());
}

#[tokio::test]
async fn malformed_key_file_is_fatal() {
	let dir = tempdir().unwrap();
	std::fs::write(dir.path().join("wg.key"), "not a key\n").unwrap();
	let client = MockNodeClient::new();
	client.insert_node(node("a", &[], "10.0.1.0/24", "192.0.2.1"));

	let agent = Agent::new(
		config(dir.path()),
		Arc::new(client.clone()),
		Arc::new(MockHost::new()),
	);

	let err = agent.bootstrap().await.unwrap_err();
	assert!(matches!(
		err,
		AgentError::Identity(KeyFileError::InvalidFormat(_))
	));
	assert!(client.patches().is_empty());
}

#[tokio::test]
async fn run_applies_watch_events_until_stream_ends() {
	let dir = tempdir().unwrap();
	let client = MockNodeClient::new();
	let a = node("a", &[], "10.0.1.0/24", "192.0.2.1");
	client.insert_node(a.clone());
	client.push_event(NodeEvent::Relisted(vec![a]));
	client.push_event(NodeEvent::Applied(node(
		"b",
		&[(PUBKEY_ANNOTATION, "kB")],
		"10.0.2.0/24",
		"192.0.2.2",
	)));
	let host = MockHost::new().with_default_route("eth0");

	let agent = Agent::new(
		config(dir.path()),
		Arc::new(client.clone()),
		Arc::new(host.clone()),
	);
	let err = agent.run(Shutdown::new()).await.unwrap_err();

	assert!(matches!(err, AgentError::WatchEnded));
	let last = host.synced_configs().pop().unwrap();
	assert!(last.contains("# Name: b\nPublicKey = kB\n"));
	assert!(host.mutations().contains(&Mutation::RouteAdded {
		destination: "10.0.2.0/24".parse().unwrap(),
		interface: "kwg".into(),
	}));
}

#[tokio::test]
async fn run_returns_cleanly_when_shutdown_already_requested() {
	let dir = tempdir().unwrap();
	let client = MockNodeClient::new();
	client.insert_node(node("a", &[], "10.0.1.0/24", "192.0.2.1"));
	client.push_event(NodeEvent::Applied(node(
		"b",
		&[(PUBKEY_ANNOTATION, "kB")],
		"10.0.2.0/24",
		"192.0.2.2",
	)));
	let host = MockHost::new();

	let shutdown = Shutdown::new();
	shutdown.request();

	let agent = Agent::new(
		config(dir.path()),
		Arc::new(client),
		Arc::new(host.clone()),
	);
	agent.run(shutdown).await.unwrap();

	assert!(host.synced_configs().is_empty());
}
