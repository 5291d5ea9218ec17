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

//! Forwarding of authentication outcomes to the peripheral.

use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AuthOutcome;
use crate::bluetooth::{ResultToken, Session};
use crate::error::LinkError;
use crate::status::{StatusCode, StatusEvent, StatusSink};

/// Writes one token line per authentication outcome.
pub struct ResultForwarder {
    sink: Arc<dyn StatusSink>,
}

impl ResultForwarder {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self { sink }
    }

    /// Send `outcome` over `session`.
    ///
    /// Returns the token written, or `None` for an error outcome, which has
    /// no token and is only reported. Never writes on a session that is not
    /// connected. Exactly one status event is emitted per call.
    pub async fn send(
        &self,
        outcome: AuthOutcome,
        session: &Session,
    ) -> Result<Option<ResultToken>, LinkError> {
        if !session.is_connected() {
            warn!("Dropping {:?}: not connected", outcome);
            return Err(self.report(LinkError::NotConnected));
        }

        let token = match ResultToken::from_outcome(&outcome) {
            Some(token) => token,
            None => {
                if let AuthOutcome::Error(reason) = outcome {
                    self.sink.on_status(StatusEvent::new(
                        StatusCode::AuthError,
                        format!("Authentication error: {}", reason),
                    ));
                }
                return Ok(None);
            }
        };

        match session.write_line(token.to_line()).await {
            Ok(()) => {
                info!("Sent to peripheral: {}", token.as_str());
                self.sink.on_status(StatusEvent::new(
                    StatusCode::Sent,
                    format!("Sent to peripheral: {}", token.as_str()),
                ));
                Ok(Some(token))
            }
            Err(e) => Err(self.report(e)),
        }
    }

    fn report(&self, err: LinkError) -> LinkError {
        self.sink.on_status(StatusEvent::from_error(&err));
        err
    }
}
