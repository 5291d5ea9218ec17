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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::status::{StatusEvent, StatusSink, Topic};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected => "Connected",
            SessionState::Failed => "Failed",
            SessionState::Closed => "Closed",
        }
    }

    /// Whether `connect()` may start a fresh attempt from here.
    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Failed | SessionState::Closed
        )
    }
}

/// What a front end would show: one line for the link, one for authentication.
#[derive(Debug)]
pub struct AppState {
    pub connection_status: RwLock<String>,
    pub auth_status: RwLock<String>,
    pub last_event: RwLock<Option<StatusEvent>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_status: RwLock::new("Not connected".to_string()),
            auth_status: RwLock::new(String::new()),
            last_event: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn apply(&self, event: &StatusEvent) {
        match event.code.topic() {
            Topic::Connection => *self.connection_status.write() = event.reason.clone(),
            Topic::Auth => *self.auth_status.write() = event.reason.clone(),
        }
        if event.code.invalidates_link() {
            *self.connection_status.write() = format!("Disconnected: {}", event.reason);
        }
        *self.last_event.write() = Some(event.clone());
    }

    pub fn get_connection_status(&self) -> String {
        self.connection_status.read().clone()
    }

    pub fn get_auth_status(&self) -> String {
        self.auth_status.read().clone()
    }

    pub fn get_last_event(&self) -> Option<StatusEvent> {
        self.last_event.read().clone()
    }
}

/// Status sink that keeps an [`AppState`] current.
pub struct DisplaySink {
    state: Arc<AppState>,
}

impl DisplaySink {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl StatusSink for DisplaySink {
    fn on_status(&self, event: StatusEvent) {
        self.state.apply(&event);
    }
}
