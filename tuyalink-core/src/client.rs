//! High-level client bundling the whole stack.

use serde_json::Value;

use crate::aggregate::Aggregator;
use crate::config::ClientConfig;
use crate::device::DeviceClient;
use crate::error::Result;
use crate::model::{Command, Device, DeviceStatus, Envelope, MergedDeviceList};
use crate::token::TokenState;
use crate::transport::Transport;

/// Client for one cloud project.
///
/// Cloning is cheap; clones share the HTTP connection pool and the cached
/// access token.
///
/// # Example
///
/// ```rust,no_run
/// use tuyalink_core::{ClientConfig, Command, TuyaClient};
///
/// # async fn example() -> tuyalink_core::Result<()> {
/// let config = ClientConfig::new("https://openapi.tuyaeu.com", "access-id", "access-secret");
/// let client = TuyaClient::new(config)?;
///
/// let devices = client.list_merged_devices().await;
/// for device in &devices.result {
///     println!("{} online={}", device.id, device.online);
/// }
///
/// client
///     .send_commands("bf0123456789", &[Command::new("switch_1", true)])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TuyaClient {
    config: ClientConfig,
    aggregator: Aggregator<DeviceClient>,
}

impl TuyaClient {
    /// Validate `config` and build the client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        let aggregator = Aggregator::new(DeviceClient::new(transport), &config);
        Ok(Self { config, aggregator })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceClient {
        self.aggregator.source()
    }

    pub fn token_state(&self) -> TokenState {
        self.devices().transport().tokens().state()
    }

    /// Every device with its live status. Never fails; see
    /// [`Aggregator::get_merged_devices`].
    pub async fn list_merged_devices(&self) -> MergedDeviceList {
        self.aggregator.get_merged_devices().await
    }

    pub async fn get_device_status(&self, device_id: &str) -> Result<Envelope<Vec<DeviceStatus>>> {
        self.devices().get_device_status(device_id).await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Envelope<Value>> {
        self.devices().get_device(device_id).await
    }

    pub async fn send_commands(&self, device_id: &str, commands: &[Command]) -> Result<Envelope<bool>> {
        self.devices().send_commands(device_id, commands).await
    }

    pub async fn get_statistics(&self) -> Result<Value> {
        self.devices().get_statistics().await
    }

    pub async fn list_user_devices(&self) -> Result<Vec<Device>> {
        self.devices()
            .list_user_devices(self.config.device_page_size)
            .await
    }
}
