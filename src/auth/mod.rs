// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Biometric authentication contract.
//!
//! Verification itself is done by an [`AuthOracle`]. Each request is wrapped
//! in a [`PendingAuth`]: it resolves to at most one outcome, and a cancelled
//! request resolves to none.

mod fprintd;

pub use fprintd::FprintdOracle;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Terminal result of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Succeeded,
    Failed,
    Error(String),
}

/// Whether the oracle can verify at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    NoHardware,
    HardwareUnavailable,
    NoneEnrolled,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "Fingerprint authentication available",
            Availability::NoHardware => "No fingerprint hardware available",
            Availability::HardwareUnavailable => "Fingerprint hardware unavailable",
            Availability::NoneEnrolled => "No fingerprints enrolled",
        }
    }
}

/// Biometric verifier.
#[async_trait]
pub trait AuthOracle: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Run one verification to completion.
    async fn authenticate(&self) -> AuthOutcome;
}

/// An authentication request in flight.
///
/// Awaiting it yields `Some(outcome)` once, or `None` if the oracle task
/// went away without answering. Dropping it cancels the request.
pub struct PendingAuth {
    rx: oneshot::Receiver<AuthOutcome>,
    task: JoinHandle<()>,
}

impl PendingAuth {
    /// Invoke the oracle on a background task.
    pub fn start(oracle: Arc<dyn AuthOracle>) -> Self {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let outcome = oracle.authenticate().await;
            debug!("{} produced {:?}", oracle.name(), outcome);
            // Receiver dropped means the request was cancelled.
            let _ = tx.send(outcome);
        });
        Self { rx, task }
    }

    /// Cancel before delivery. No outcome will be observed.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for PendingAuth {
    type Output = Option<AuthOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

impl Drop for PendingAuth {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct Gated {
        release: Notify,
        calls: AtomicUsize,
        completed: AtomicUsize,
        outcome: AuthOutcome,
    }

    #[async_trait]
    impl AuthOracle for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn authenticate(&self) -> AuthOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn gated(outcome: AuthOutcome) -> Arc<Gated> {
        Arc::new(Gated {
            release: Notify::new(),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            outcome,
        })
    }

    #[tokio::test]
    async fn test_single_delivery() {
        let oracle = gated(AuthOutcome::Failed);
        let pending = PendingAuth::start(oracle.clone());
        oracle.release.notify_one();

        assert_eq!(pending.await, Some(AuthOutcome::Failed));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_delivery() {
        let oracle = gated(AuthOutcome::Succeeded);
        let pending = PendingAuth::start(oracle.clone());
        tokio::task::yield_now().await;

        pending.cancel();
        oracle.release.notify_one();
        tokio::task::yield_now().await;

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_availability_text() {
        assert_eq!(
            Availability::NoneEnrolled.as_str(),
            "No fingerprints enrolled"
        );
    }
}
