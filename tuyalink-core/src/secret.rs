//! Redacting wrapper for credential material.
//!
//! The client secret and every token issued by the cloud are held in a
//! [`Secret`]. `Debug` and `Display` never print the inner value, and the
//! buffer is zeroed when the secret is dropped.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Placeholder written wherever a token would otherwise appear in logs.
pub const TOKEN_MASK: &str = "TOKEN_HIDDEN";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short, log-safe hint: the first four characters followed by `***`.
    ///
    /// Values of eight characters or fewer are masked completely.
    pub fn masked(&self) -> String {
        if self.0.chars().count() <= 8 {
            return "***".to_string();
        }
        let head: String = self.0.chars().take(4).collect();
        format!("{}***", head)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
