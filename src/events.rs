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

//! Event processing and dispatch.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::{AuthOracle, AuthOutcome, Availability, PendingAuth};
use crate::bluetooth::{PermissionGate, ResultToken, Session};
use crate::error::LinkError;
use crate::forwarder::ResultForwarder;
use crate::status::{StatusCode, StatusEvent, StatusSink};

/// User actions a front end produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// Open the link to the peripheral.
    Connect,
    /// Verify a fingerprint and forward the result.
    Authenticate,
    /// Abandon the authentication in progress.
    CancelAuth,
    /// Close the link.
    Disconnect,
    /// Ask the permission gate for authority.
    RequestAuthority,
}

impl UiEvent {
    /// Parse a typed command.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "connect" | "c" => Some(Self::Connect),
            "auth" | "authenticate" | "a" => Some(Self::Authenticate),
            "cancel" => Some(Self::CancelAuth),
            "disconnect" | "d" => Some(Self::Disconnect),
            "enable" | "grant" => Some(Self::RequestAuthority),
            _ => None,
        }
    }
}

/// Drives the session, oracle and forwarder from UI events.
///
/// Runs on one task; authentication outcomes are delivered on that same
/// task, while transport opens and writes happen on worker tasks.
pub struct EventProcessor {
    session: Arc<Session>,
    forwarder: ResultForwarder,
    oracle: Arc<dyn AuthOracle>,
    gate: Arc<dyn PermissionGate>,
    sink: Arc<dyn StatusSink>,
    pending: Option<PendingAuth>,
}

impl EventProcessor {
    /// Create a new event processor.
    pub fn new(
        session: Arc<Session>,
        oracle: Arc<dyn AuthOracle>,
        gate: Arc<dyn PermissionGate>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            session,
            forwarder: ResultForwarder::new(sink.clone()),
            oracle,
            gate,
            sink,
            pending: None,
        }
    }

    /// Process a single event.
    pub async fn process_event(&mut self, event: UiEvent) {
        debug!("Processing {:?}", event);

        match event {
            UiEvent::Connect => {
                let session = self.session.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.connect().await {
                        debug!("Connect attempt ended: {}", e);
                    }
                });
            }
            UiEvent::Authenticate => self.start_auth().await,
            UiEvent::CancelAuth => match self.pending.take() {
                Some(pending) => {
                    pending.cancel();
                    info!("Authentication cancelled");
                    self.emit(StatusCode::AuthCancelled, "Authentication cancelled");
                }
                None => debug!("No authentication to cancel"),
            },
            UiEvent::Disconnect => self.session.teardown().await,
            UiEvent::RequestAuthority => {
                let answer = self.gate.request_authority();
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    let event = match answer.await {
                        Ok(true) => StatusEvent::new(
                            StatusCode::PermissionGranted,
                            "Bluetooth permissions granted",
                        ),
                        _ => StatusEvent::new(
                            StatusCode::PermissionDenied,
                            "Bluetooth permissions denied",
                        ),
                    };
                    sink.on_status(event);
                });
            }
        }
    }

    async fn start_auth(&mut self) {
        if self.pending.is_some() {
            self.emit(StatusCode::AuthBusy, "Authentication already in progress");
            return;
        }

        let availability = self.oracle.availability().await;
        if availability != Availability::Available {
            warn!("{}: {}", self.oracle.name(), availability.as_str());
            self.emit(StatusCode::AuthUnavailable, availability.as_str());
            return;
        }

        info!("Starting {} verification", self.oracle.name());
        self.pending = Some(PendingAuth::start(self.oracle.clone()));
    }

    /// Forward one outcome to the peripheral.
    pub async fn deliver(
        &mut self,
        outcome: AuthOutcome,
    ) -> Result<Option<ResultToken>, LinkError> {
        self.forwarder.send(outcome, &self.session).await
    }

    /// Run until the event channel closes.
    ///
    /// A request still pending at that point is cancelled.
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
                outcome = next_outcome(&mut self.pending) => {
                    self.pending = None;
                    match outcome {
                        Some(outcome) => {
                            info!("Authentication outcome: {:?}", outcome);
                            if let Err(e) = self.deliver(outcome).await {
                                debug!("Outcome not forwarded: {}", e);
                            }
                        }
                        None => warn!("Authentication ended without a result"),
                    }
                }
            }
        }

        debug!("Event processor stopped");
    }

    fn emit(&self, code: StatusCode, reason: &str) {
        self.sink.on_status(StatusEvent::new(code, reason));
    }
}

async fn next_outcome(pending: &mut Option<PendingAuth>) -> Option<AuthOutcome> {
    match pending {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}
