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

//! Permission gate in front of the transport.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

/// Confirms the process may use the transport.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn has_authority(&self) -> bool;

    /// Ask for authority. The answer arrives later on the returned receiver;
    /// a dropped sender means the request was abandoned.
    fn request_authority(&self) -> oneshot::Receiver<bool>;
}

/// Gate with a fixed, switchable answer. Requests always succeed.
#[derive(Debug)]
pub struct StaticGate {
    granted: AtomicBool,
}

impl StaticGate {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionGate for StaticGate {
    async fn has_authority(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_authority(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.granted.store(true, Ordering::SeqCst);
        let _ = tx.send(true);
        rx
    }
}
