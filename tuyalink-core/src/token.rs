//! Access token lifecycle.
//!
//! This module provides:
//! - [`Credential`] - One issued access token with its refresh token, uid and expiry
//! - [`Authenticator`] - Trait for the remote token exchange
//! - [`TokenStore`] - Holds the current credential and refreshes it single-flight
//!
//! Readers take a snapshot of the published `Arc<Credential>` without touching
//! the refresh lock. Only a caller that sees an absent or expiring credential
//! enters the refresh section, and it re-checks after acquiring the lock so
//! that N concurrent callers produce exactly one token request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::secret::Secret;

/// Credentials are treated as expired this long before the provider's expiry.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// An access token issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Secret,

    /// Kept for completeness; refreshes use a fresh token exchange.
    pub refresh_token: Secret,

    /// Account the project is linked to.
    pub uid: String,

    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<Secret>,
        refresh_token: impl Into<Secret>,
        uid: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            uid: uid.into(),
            expires_at,
        }
    }

    /// Valid if `now` plus the safety margin is still before the expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(SAFETY_MARGIN_SECS) < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Observable state of a [`TokenStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

/// Performs the remote token exchange.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtain a brand new credential.
    async fn authenticate(&self) -> Result<Credential>;
}

/// Owner of the single active credential.
pub struct TokenStore {
    current: RwLock<Option<Arc<Credential>>>,
    refresh_lock: Mutex<()>,
    authenticator: Arc<dyn Authenticator>,
}

impl TokenStore {
    /// Create an empty store; the first caller triggers authentication.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            authenticator,
        }
    }

    /// Snapshot of the published credential, valid or not.
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.current.read().clone()
    }

    pub fn state(&self) -> TokenState {
        match self.current() {
            None => TokenState::Absent,
            Some(c) if c.is_valid() => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// Publish a credential obtained elsewhere, replacing the current one.
    pub fn install(&self, credential: Credential) {
        *self.current.write() = Some(Arc::new(credential));
    }

    /// Return a valid credential, authenticating at most once across
    /// concurrent callers.
    ///
    /// A failed exchange is returned to every caller that was waiting on it
    /// through its own attempt; nothing is cached, so the next call retries.
    pub async fn get_valid_token(&self) -> Result<Arc<Credential>> {
        if let Some(credential) = self.current() {
            if credential.is_valid() {
                return Ok(credential);
            }
        }

        let _guard = self.refresh_lock.lock().await;

        if let Some(credential) = self.current() {
            if credential.is_valid() {
                tracing::debug!("Access token already refreshed by another caller");
                return Ok(credential);
            }
        }

        tracing::debug!("Access token absent or expiring, requesting a new one");
        match self.authenticator.authenticate().await {
            Ok(credential) => {
                let credential = Arc::new(credential);
                *self.current.write() = Some(Arc::clone(&credential));
                tracing::info!(
                    "Obtained access token for uid {}, expires at {}",
                    credential.uid,
                    credential.expires_at
                );
                Ok(credential)
            }
            Err(e) => {
                tracing::error!("Failed to obtain access token: {}", e);
                Err(e)
            }
        }
    }

    /// Drop the current credential so the next caller re-authenticates.
    ///
    /// Safe to call while a refresh is in flight: the refresh publishes a
    /// fresh credential afterwards, which is the desired outcome anyway.
    pub fn invalidate(&self) {
        if let Some(old) = self.current.write().take() {
            tracing::warn!(
                "Access token {} invalidated, next call will re-authenticate",
                old.access_token.masked()
            );
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("state", &self.state())
            .finish()
    }
}
