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

//! Transport provider abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{AddressError, TransportError};

/// A six-octet device address, written `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut octets = [0u8; 6];
        let mut parts = trimmed.split(':');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| AddressError(s.to_string()))?;
            if part.len() != 2 {
                return Err(AddressError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| AddressError(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(AddressError(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerAddress> for String {
    fn from(addr: PeerAddress) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// A resolved, connectable peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    pub address: PeerAddress,
    /// RFCOMM channel (or transport-specific port) to open.
    pub port: u8,
    /// Friendly name, when the stack knows one.
    pub name: Option<String>,
}

impl PeerHandle {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.address.to_string())
    }
}

/// Duplex byte stream to the peripheral.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Owned channel handed out by a transport.
pub type Channel = Box<dyn DuplexStream>;

/// Radio stack as seen by the session.
#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Resolve an address into something `open` accepts.
    async fn resolve(&self, address: &PeerAddress) -> Result<PeerHandle, TransportError>;

    /// Open a duplex channel to a resolved peer. May block for seconds.
    async fn open(&self, handle: PeerHandle) -> Result<Channel, TransportError>;

    /// Release a channel previously returned by `open`.
    async fn close(&self, channel: Channel);
}
