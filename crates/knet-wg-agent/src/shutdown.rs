// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Two-stage shutdown: the first signal stops the dispatcher after the pass in
//! flight, a second one exits immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

/// Exit status used when a second signal cuts shutdown short.
pub const FORCED_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Graceful,
	Forced,
}

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
	token: CancellationToken,
	signals: Arc<AtomicUsize>,
}

impl Shutdown {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn request(&self) {
		self.token.cancel();
	}

	pub fn is_requested(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Resolves once shutdown has been requested.
	pub fn requested(&self) -> WaitForCancellationFuture<'_> {
		self.token.cancelled()
	}

	/// Records a received signal and reports which stage it triggers.
	pub fn signal(&self) -> Stage {
		if self.signals.fetch_add(1, Ordering::SeqCst) == 0 {
			self.request();
			Stage::Graceful
		} else {
			Stage::Forced
		}
	}
}

/// Listens for SIGINT and SIGTERM for the lifetime of the process.
#[cfg(unix)]
pub fn install_signal_handlers(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
	use tokio::signal::unix::{signal, SignalKind};

	let mut terminate = signal(SignalKind::terminate())?;
	let mut interrupt = signal(SignalKind::interrupt())?;

	Ok(tokio::spawn(async move {
		loop {
			tokio::select! {
				_ = terminate.recv() => {}
				_ = interrupt.recv() => {}
			}
			escalate(&shutdown);
		}
	}))
}

#[cfg(not(unix))]
pub fn install_signal_handlers(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
	Ok(tokio::spawn(async move {
		while tokio::signal::ctrl_c().await.is_ok() {
			escalate(&shutdown);
		}
	}))
}

fn escalate(shutdown: &Shutdown) {
	match shutdown.signal() {
		Stage::Graceful => info!("received shutdown signal, finishing current work"),
		Stage::Forced => {
			warn!("received second shutdown signal, exiting now");
			std::process::exit(FORCED_EXIT_CODE);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn first_signal_is_graceful_then_forced() {
		let shutdown = Shutdown::new();
		assert!(!shutdown.is_requested());

		assert_eq!(shutdown.signal(), Stage::Graceful);
		assert!(shutdown.is_requested());
		assert_eq!(shutdown.signal(), Stage::Forced);
		assert_eq!(shutdown.signal(), Stage::Forced);
	}

	#[tokio::test]
	async fn clones_observe_request() {
		let shutdown = Shutdown::new();
		let observer = shutdown.clone();

		let waiter = tokio::spawn(async move { observer.requested().await });
		shutdown.request();

		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
	}

	#[test]
	fn signal_counts_are_shared_between_clones() {
		let shutdown = Shutdown::new();
		assert_eq!(shutdown.clone().signal(), Stage::Graceful);
		assert_eq!(shutdown.signal(), Stage::Forced);
	}
}
