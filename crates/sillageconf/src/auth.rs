//! Shared-secret settings for write endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Write authorization settings.
///
/// When `token` is `None` every write is accepted.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in `X-API-Key` or `?token=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthConfig {
    /// Build from a raw value. Only `None` leaves writes open; an empty
    /// string is still a configured secret.
    pub fn from_raw(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
