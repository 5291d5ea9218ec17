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

//! Forwards fingerprint verification results to a serial Bluetooth
//! peripheral.
//!
//! A [`bluetooth::Session`] owns the RFCOMM link; the
//! [`forwarder::ResultForwarder`] writes `Authenticated\n` or `Failed\n` on
//! it, and only while it is connected.

pub mod auth;
pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod state;
pub mod status;

pub use error::{LinkError, TransportError};
