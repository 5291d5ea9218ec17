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

//! Fingerprint verification using fprintd's command line tools.

use async_trait::async_trait;
use std::env;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{AuthOracle, AuthOutcome, Availability};
use crate::config::AuthConfig;

/// Oracle backed by `fprintd-verify` and `fprintd-list`.
pub struct FprintdOracle {
    verify_command: String,
    list_command: String,
    finger: Option<String>,
    user: Option<String>,
}

impl FprintdOracle {
    /// Create an oracle for the current user.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            verify_command: config.verify_command.clone(),
            list_command: config.list_command.clone(),
            finger: config.finger.clone(),
            user: env::var("USER").ok(),
        }
    }
}

#[async_trait]
impl AuthOracle for FprintdOracle {
    fn name(&self) -> &'static str {
        "fprintd"
    }

    async fn availability(&self) -> Availability {
        let mut cmd = Command::new(&self.list_command);
        if let Some(ref user) = self.user {
            cmd.arg(user);
        }

        match cmd.output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                parse_list_output(&format!("{}{}", stdout, stderr), output.status.success())
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.list_command, e);
                Availability::HardwareUnavailable
            }
        }
    }

    async fn authenticate(&self) -> AuthOutcome {
        let mut cmd = Command::new(&self.verify_command);
        if let Some(ref finger) = self.finger {
            cmd.arg("-f").arg(finger);
        }
        // A cancelled request must not leave the prompt running.
        cmd.kill_on_drop(true);

        debug!("Running: {} {:?}", self.verify_command, self.finger);

        match cmd.output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                parse_verify_output(&format!("{}{}", stdout, stderr))
            }
            Err(e) => AuthOutcome::Error(format!("Failed to run {}: {}", self.verify_command, e)),
        }
    }
}

/// Interpret `fprintd-verify` output. The last `Verify result:` line wins.
fn parse_verify_output(output: &str) -> AuthOutcome {
    if output.contains("No devices available") {
        return AuthOutcome::Error(Availability::NoHardware.as_str().to_string());
    }

    let result = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Verify result:"))
        .last()
        .and_then(|rest| rest.split_whitespace().next());

    match result {
        Some("verify-match") => AuthOutcome::Succeeded,
        Some("verify-no-match") => AuthOutcome::Failed,
        Some(other) => AuthOutcome::Error(other.to_string()),
        None => {
            let detail = output.lines().last().unwrap_or("no output").trim();
            AuthOutcome::Error(format!("Verification did not complete: {}", detail))
        }
    }
}

/// Interpret `fprintd-list` output.
fn parse_list_output(output: &str, success: bool) -> Availability {
    if output.contains("No devices available") {
        Availability::NoHardware
    } else if output.contains("no fingers enrolled") {
        Availability::NoneEnrolled
    } else if !success {
        Availability::HardwareUnavailable
    } else {
        Availability::Available
    }
}
