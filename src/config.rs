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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{PeerAddress, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RFCOMM_CHANNEL};

/// HC-05 module the peripheral ships with.
const DEFAULT_PEER: PeerAddress = PeerAddress::new([0x00, 0x22, 0x12, 0x01, 0x4A, 0x6F]);

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link settings.
    pub link: LinkConfig,

    /// Fingerprint verification settings.
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address of the peripheral's serial module.
    pub peer_address: PeerAddress,

    /// RFCOMM channel the module listens on.
    pub rfcomm_channel: u8,

    /// Upper bound on one connection attempt, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Adapter name (e.g. "hci1"); the default adapter when unset.
    pub adapter: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer_address: DEFAULT_PEER,
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            adapter: None,
        }
    }
}

impl LinkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Finger to verify; fprintd picks any enrolled finger when unset.
    pub finger: Option<String>,

    pub verify_command: String,

    pub list_command: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            finger: None,
            verify_command: "fprintd-verify".to_string(),
            list_command: "fprintd-list".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("authlink")
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
