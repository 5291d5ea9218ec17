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

//! Status notifications emitted by the session and forwarder.
//!
//! Events are fire-and-forget: the core hands each one to a [`StatusSink`]
//! synchronously and keeps no copy.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::LinkError;

/// Stable, machine-checkable status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Connecting,
    Connected,
    Closed,
    PermissionDenied,
    PermissionGranted,
    AlreadyConnecting,
    ConnectFailed,
    ConnectTimeout,
    ConnectCancelled,
    NotConnected,
    Sent,
    WriteFailed,
    AuthError,
    AuthUnavailable,
    AuthBusy,
    AuthCancelled,
}

/// Which status line a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Connection,
    Auth,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Closed => "CLOSED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::PermissionGranted => "PERMISSION_GRANTED",
            Self::AlreadyConnecting => "ALREADY_CONNECTING",
            Self::ConnectFailed => "CONNECT_FAILED",
            Self::ConnectTimeout => "CONNECT_TIMEOUT",
            Self::ConnectCancelled => "CONNECT_CANCELLED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Sent => "SENT",
            Self::WriteFailed => "WRITE_FAILED",
            Self::AuthError => "AUTH_ERROR",
            Self::AuthUnavailable => "AUTH_UNAVAILABLE",
            Self::AuthBusy => "AUTH_BUSY",
            Self::AuthCancelled => "AUTH_CANCELLED",
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            Self::Connecting
            | Self::Connected
            | Self::Closed
            | Self::PermissionDenied
            | Self::PermissionGranted
            | Self::AlreadyConnecting
            | Self::ConnectFailed
            | Self::ConnectTimeout
            | Self::ConnectCancelled => Topic::Connection,
            Self::NotConnected
            | Self::Sent
            | Self::WriteFailed
            | Self::AuthError
            | Self::AuthUnavailable
            | Self::AuthBusy
            | Self::AuthCancelled => Topic::Auth,
        }
    }

    /// Whether this code means the link was dropped, whatever its topic.
    pub fn invalidates_link(&self) -> bool {
        matches!(self, Self::WriteFailed)
    }

    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            Self::Connecting
                | Self::Connected
                | Self::Closed
                | Self::PermissionGranted
                | Self::Sent
                | Self::AuthCancelled
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observable transition or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub code: StatusCode,
    pub reason: String,
    pub at: DateTime<Local>,
}

impl StatusEvent {
    pub fn new(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            at: Local::now(),
        }
    }

    pub fn from_error(err: &LinkError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.reason)
    }
}

/// Receiver of status events.
///
/// Called from whichever task produced the transition; implementations must
/// return promptly.
pub trait StatusSink: Send + Sync {
    fn on_status(&self, event: StatusEvent);
}

impl<F> StatusSink for F
where
    F: Fn(StatusEvent) + Send + Sync,
{
    fn on_status(&self, event: StatusEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`.
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn on_status(&self, event: StatusEvent) {
        if event.code.is_failure() {
            warn!(code = %event.code, "{}", event.reason);
        } else {
            info!(code = %event.code, "{}", event.reason);
        }
    }
}

/// Forwards events into an unbounded channel for another task to render.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn on_status(&self, event: StatusEvent) {
        // Receiver gone means nobody is rendering anymore.
        let _ = self.tx.send(event);
    }
}

/// Delivers each event to several sinks in order.
pub struct FanoutSink {
    sinks: Vec<Box<dyn StatusSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Default for FanoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for FanoutSink {
    fn on_status(&self, event: StatusEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.on_status(event.clone());
            }
            last.on_status(event);
        }
    }
}
