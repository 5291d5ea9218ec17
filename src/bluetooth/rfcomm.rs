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

//! BlueZ RFCOMM client transport.

use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address, ErrorKind};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::permission::PermissionGate;
use super::protocol::SPP_UUID;
use super::transport::{Channel, PeerAddress, PeerHandle, TransportProvider};
use crate::error::TransportError;

/// Open the named adapter, or the default one.
pub async fn open_adapter(name: Option<&str>) -> Result<Adapter, TransportError> {
    let session = bluer::Session::new().await.map_err(from_bluer)?;
    debug!("BlueZ session created");

    let adapter = match name {
        Some(name) => session.adapter(name).map_err(from_bluer)?,
        None => session.default_adapter().await.map_err(from_bluer)?,
    };
    info!("Using Bluetooth adapter: {}", adapter.name());

    Ok(adapter)
}

fn from_bluer(e: bluer::Error) -> TransportError {
    match e.kind {
        ErrorKind::NotAuthorized
        | ErrorKind::NotPermitted
        | ErrorKind::AuthenticationFailed
        | ErrorKind::AuthenticationRejected
        | ErrorKind::AuthenticationCanceled => TransportError::Security(e.to_string()),
        ErrorKind::NotFound | ErrorKind::DoesNotExist | ErrorKind::NotAvailable => {
            TransportError::Unavailable(e.to_string())
        }
        _ => TransportError::Io(io::Error::new(io::ErrorKind::Other, e)),
    }
}

fn from_socket(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        TransportError::Security(e.to_string())
    } else {
        TransportError::Io(e)
    }
}

/// Serial port profile client over RFCOMM.
pub struct RfcommTransport {
    adapter: Adapter,
    channel: u8,
}

impl RfcommTransport {
    /// Create a transport that opens `channel` on peers.
    pub fn new(adapter: Adapter, channel: u8) -> Self {
        Self { adapter, channel }
    }
}

#[async_trait]
impl TransportProvider for RfcommTransport {
    async fn resolve(&self, address: &PeerAddress) -> Result<PeerHandle, TransportError> {
        let addr = Address::new(address.octets());
        let device = self.adapter.device(addr).map_err(from_bluer)?;

        let name = match device.alias().await {
            Ok(alias) => Some(alias),
            Err(e) => {
                debug!("No alias for {}: {}", addr, e);
                None
            }
        };

        if let Ok(Some(uuids)) = device.uuids().await {
            if !uuids.is_empty() && !uuids.contains(&SPP_UUID) {
                warn!("{} does not advertise the serial port profile", addr);
            }
        }

        Ok(PeerHandle {
            address: *address,
            port: self.channel,
            name,
        })
    }

    async fn open(&self, handle: PeerHandle) -> Result<Channel, TransportError> {
        let target = SocketAddr::new(Address::new(handle.address.octets()), handle.port);
        info!(
            "Opening RFCOMM channel {} to {}",
            handle.port,
            handle.display_name()
        );

        let stream = Stream::connect(target).await.map_err(from_socket)?;
        Ok(Box::new(stream))
    }

    async fn close(&self, mut channel: Channel) {
        if let Err(e) = channel.shutdown().await {
            debug!("Shutdown on close failed: {}", e);
        }
    }
}

/// Authority means a present, powered adapter.
pub struct AdapterGate {
    adapter: Adapter,
}

impl AdapterGate {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl PermissionGate for AdapterGate {
    async fn has_authority(&self) -> bool {
        match self.adapter.is_powered().await {
            Ok(powered) => powered,
            Err(e) => {
                warn!("Cannot query adapter {}: {}", self.adapter.name(), e);
                false
            }
        }
    }

    fn request_authority(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let adapter = self.adapter.clone();

        tokio::spawn(async move {
            info!("Powering on Bluetooth adapter...");
            let granted = match adapter.set_powered(true).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Bluetooth not enabled: {}", e);
                    false
                }
            };
            let _ = tx.send(granted);
        });

        rx
    }
}
