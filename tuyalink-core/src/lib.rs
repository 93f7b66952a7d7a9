//! # Tuyalink Core
//!
//! Client library for the Tuya device cloud API.
//!
//! This crate provides:
//! - HMAC-SHA256 request signing ([`sign`])
//! - A token store with single-flight refresh and invalidation ([`token`])
//! - An authenticated transport decoding the provider's response envelope ([`transport`])
//! - Device operations: listing, status, commands, statistics ([`device`])
//! - Bounded fan-out merging devices with their live status ([`aggregate`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tuyalink_core::{ClientConfig, TuyaClient};
//!
//! let client = TuyaClient::new(ClientConfig::new(base_url, client_id, client_secret))?;
//! let merged = client.list_merged_devices().await;
//! ```

pub mod aggregate;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod secret;
pub mod sign;
pub mod token;
pub mod transport;

// Re-export commonly used types at crate root
pub use aggregate::{Aggregator, DeviceSource};

pub use client::TuyaClient;

pub use config::{ClientConfig, CONCURRENCY_LIMIT, DEFAULT_BASE_URL};

pub use device::DeviceClient;

pub use error::{ClientError, Result, TOKEN_INVALID_CODE};

pub use model::{
    Command,
    Device,
    DeviceList,
    DeviceStatus,
    Envelope,
    MergedDevice,
    MergedDeviceList,
    StatusValue,
};

pub use secret::Secret;

pub use sign::{Signature, Signer};

pub use token::{
    Authenticator,
    Credential,
    TokenState,
    TokenStore,
};

pub use transport::{SignedHttp, TokenEndpoint, Transport};
