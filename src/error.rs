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

//! Error types for the link and its transport.

use std::io;
use thiserror::Error;

use crate::status::StatusCode;

/// Errors raised by a transport provider while resolving or opening a peer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The process lacks authority to use the radio for this peer.
    #[error("security error: {0}")]
    Security(String),

    /// The link could not be established.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No usable adapter or peer.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The open task stopped before reporting a result.
    #[error("open aborted: {0}")]
    Aborted(String),
}

impl TransportError {
    /// Whether the caller should re-request authority rather than retry the link.
    pub fn is_security(&self) -> bool {
        match self {
            Self::Security(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

/// Errors returned by session and forwarder operations.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Bluetooth permission not granted")]
    PermissionDenied,

    #[error("Connection attempt already in progress")]
    AlreadyConnecting,

    #[error("Failed to connect: {0}")]
    TransportOpenFailed(#[source] TransportError),

    #[error("Connection attempt timed out")]
    TransportTimeout,

    #[error("Connection attempt cancelled by teardown")]
    Cancelled,

    #[error("Not connected to peripheral")]
    NotConnected,

    #[error("Failed to send data to peripheral: {0}")]
    WriteFailed(#[source] io::Error),
}

impl LinkError {
    /// Status code reported alongside this error.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::PermissionDenied => StatusCode::PermissionDenied,
            Self::AlreadyConnecting => StatusCode::AlreadyConnecting,
            Self::TransportOpenFailed(_) => StatusCode::ConnectFailed,
            Self::TransportTimeout => StatusCode::ConnectTimeout,
            Self::Cancelled => StatusCode::ConnectCancelled,
            Self::NotConnected => StatusCode::NotConnected,
            Self::WriteFailed(_) => StatusCode::WriteFailed,
        }
    }

    /// True for authority problems, whether found by the gate or by the transport.
    pub fn is_security(&self) -> bool {
        match self {
            Self::PermissionDenied => true,
            Self::TransportOpenFailed(e) => e.is_security(),
            _ => false,
        }
    }
}

/// A peer identifier that is not six colon-separated hex octets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid device address '{0}'")]
pub struct AddressError(pub String);
