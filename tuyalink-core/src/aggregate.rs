//! Fan-out/merge of the device listing with per-device status.
//!
//! [`Aggregator::get_merged_devices`] lists the project's devices, fetches
//! each device's status with at most `concurrency_limit` requests in flight,
//! and merges the two into [`MergedDevice`] records. A failed status fetch
//! only marks that device offline; the aggregate call itself never returns
//! an error, it reports failures inside the [`MergedDeviceList`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::config::ClientConfig;
use crate::device::DeviceClient;
use crate::error::{ClientError, Result};
use crate::model::{Device, DeviceList, DeviceStatus, Envelope, MergedDevice, MergedDeviceList};

/// The two remote calls the aggregator combines.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn list_devices(&self, page_size: u32) -> Result<DeviceList>;

    async fn get_device_status(&self, device_id: &str) -> Result<Envelope<Vec<DeviceStatus>>>;
}

#[async_trait]
impl DeviceSource for DeviceClient {
    async fn list_devices(&self, page_size: u32) -> Result<DeviceList> {
        DeviceClient::list_devices(self, page_size).await
    }

    async fn get_device_status(&self, device_id: &str) -> Result<Envelope<Vec<DeviceStatus>>> {
        DeviceClient::get_device_status(self, device_id).await
    }
}

/// Produces the unified device + status view.
#[derive(Debug, Clone)]
pub struct Aggregator<S = DeviceClient> {
    source: S,
    concurrency_limit: usize,
    page_size: u32,
    timeout: Duration,
}

impl<S: DeviceSource> Aggregator<S> {
    /// Create an aggregator using the fan-out settings from `config`.
    pub fn new(source: S, config: &ClientConfig) -> Self {
        Self {
            source,
            concurrency_limit: config.concurrency_limit,
            page_size: config.device_page_size,
            timeout: config.aggregate_timeout,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// List devices and merge in their live status.
    ///
    /// Never fails: listing errors, an empty listing and the overall deadline
    /// are reported as an unsuccessful, empty list carrying the listing's
    /// code and message when there is one.
    /// Records come back in completion order.
    pub async fn get_merged_devices(&self) -> MergedDeviceList {
        match tokio::time::timeout(self.timeout, self.merge_all()).await {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                tracing::error!("Failed to list devices: {}", e);
                MergedDeviceList::failed(e.code(), Some(e.to_string()), Utc::now().timestamp_millis(), None)
            }
            Err(_) => {
                let e = ClientError::Timeout(self.timeout);
                tracing::error!("Device aggregation abandoned: {}", e);
                MergedDeviceList::failed(None, Some(e.to_string()), Utc::now().timestamp_millis(), None)
            }
        }
    }

    async fn merge_all(&self) -> Result<MergedDeviceList> {
        let listing = self.source.list_devices(self.page_size).await?;

        // Nothing to merge is reported as a failed result either way.
        if !listing.success || listing.devices.is_empty() {
            if listing.success {
                tracing::warn!("Device listing returned no devices");
            } else {
                tracing::warn!(
                    "Device listing failed: code {:?}, msg {:?}",
                    listing.code,
                    listing.msg
                );
            }
            return Ok(MergedDeviceList::failed(
                listing.code,
                listing.msg,
                listing.t,
                listing.tid,
            ));
        }

        let limit = self.concurrency_limit.min(listing.devices.len()).max(1);
        tracing::debug!(
            "Fetching status for {} devices, {} at a time",
            listing.devices.len(),
            limit
        );

        let merged: Vec<MergedDevice> = stream::iter(listing.devices.iter())
            .map(|device| self.merge_one(device))
            .buffer_unordered(limit)
            .collect()
            .await;

        let online = merged.iter().filter(|d| d.online).count();
        tracing::info!("Merged {} devices ({} online)", merged.len(), online);

        Ok(MergedDeviceList::ok(merged, listing.t, listing.tid))
    }

    async fn merge_one(&self, device: &Device) -> MergedDevice {
        match self.source.get_device_status(&device.id).await {
            Ok(envelope) if envelope.success => {
                MergedDevice::new(device, true, envelope.result.unwrap_or_default())
            }
            Ok(envelope) => {
                tracing::warn!(
                    "Device {} reported no status: {}",
                    device.id,
                    envelope.failure_message()
                );
                MergedDevice::offline(device)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch status for {}: {}", device.id, e);
                MergedDevice::offline(device)
            }
        }
    }
}
