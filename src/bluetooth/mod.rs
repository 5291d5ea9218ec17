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

//! Bluetooth serial link module.
//!
//! Handles the RFCOMM client session to the peripheral.

mod permission;
pub mod protocol;
#[cfg(feature = "bluez")]
pub mod rfcomm;
mod session;
mod transport;

pub use permission::{PermissionGate, StaticGate};
pub use protocol::{ResultToken, DEFAULT_RFCOMM_CHANNEL, SPP_UUID};
pub use session::{Session, DEFAULT_CONNECT_TIMEOUT};
pub use transport::{Channel, DuplexStream, PeerAddress, PeerHandle, TransportProvider};
