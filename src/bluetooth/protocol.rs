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

//! Serial wire protocol spoken to the peripheral.
//!
//! One ASCII token per line, `\n` terminated. No framing, checksum or
//! acknowledgement.

use uuid::Uuid;

use crate::auth::AuthOutcome;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel serial modules listen on by default.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Line terminator.
pub const LINE_END: char = '\n';

/// Tokens the peripheral understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultToken {
    Authenticated,
    Failed,
}

impl ResultToken {
    /// Map an outcome to its token. Errors have no token.
    pub fn from_outcome(outcome: &AuthOutcome) -> Option<Self> {
        match outcome {
            AuthOutcome::Succeeded => Some(Self::Authenticated),
            AuthOutcome::Failed => Some(Self::Failed),
            AuthOutcome::Error(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "Authenticated",
            Self::Failed => "Failed",
        }
    }

    /// Serialize with the line delimiter.
    pub fn to_line(&self) -> String {
        format!("{}{}", self.as_str(), LINE_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lines() {
        assert_eq!(ResultToken::Authenticated.to_line(), "Authenticated\n");
        assert_eq!(ResultToken::Failed.to_line(), "Failed\n");
    }

    #[test]
    fn test_from_outcome() {
        assert_eq!(
            ResultToken::from_outcome(&AuthOutcome::Succeeded),
            Some(ResultToken::Authenticated)
        );
        assert_eq!(
            ResultToken::from_outcome(&AuthOutcome::Failed),
            Some(ResultToken::Failed)
        );
        assert_eq!(
            ResultToken::from_outcome(&AuthOutcome::Error("sensor busy".into())),
            None
        );
    }

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SPP_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
