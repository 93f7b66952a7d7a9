//! Device operations on top of the authenticated [`Transport`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::model::{Command, CommandRequest, Device, DeviceList, DeviceStatus, Envelope};
use crate::transport::{Transport, decode_envelope, encode_segment};

/// Provider-versioned device listing endpoint.
pub const DEVICE_LIST_PATH: &str = "/v2.0/cloud/thing/device";

/// Diagnostic statistics endpoint.
pub const STATISTICS_PATH: &str = "/v1.0/devices/statistics";

/// Safety cap on pages walked by [`DeviceClient::list_user_devices`].
const MAX_USER_DEVICE_PAGES: u32 = 100;

/// Device-facing operations.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    transport: Transport,
}

impl DeviceClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// List the project's devices.
    ///
    /// The provider returns `result` either as a bare array or as an object
    /// holding a `list` array; both normalise to the same flat list. A missing
    /// or unreadable `result` yields an empty list rather than an error.
    pub async fn list_devices(&self, page_size: u32) -> Result<DeviceList> {
        let path = format!("{}?page_size={}", DEVICE_LIST_PATH, page_size);
        let value = self.transport.call_raw(reqwest::Method::GET, &path, None).await?;
        Ok(parse_device_list(value))
    }

    /// Live data points of one device. The envelope is returned as-is.
    pub async fn get_device_status(&self, device_id: &str) -> Result<Envelope<Vec<DeviceStatus>>> {
        let path = format!("/v1.0/devices/{}/status", encode_segment(device_id));
        let envelope: Envelope<Vec<DeviceStatus>> = self.transport.get(&path).await?;
        if !envelope.success {
            tracing::warn!(
                "Status request for {} returned success=false: {}",
                device_id,
                envelope.failure_message()
            );
        }
        Ok(envelope)
    }

    /// Details of one device, passed through without shape assumptions.
    pub async fn get_device(&self, device_id: &str) -> Result<Envelope<Value>> {
        let path = format!("/v1.0/devices/{}", encode_segment(device_id));
        self.transport.get(&path).await
    }

    /// Send data-point writes to a device.
    ///
    /// An empty command list is rejected before any network call.
    pub async fn send_commands(&self, device_id: &str, commands: &[Command]) -> Result<Envelope<bool>> {
        if device_id.trim().is_empty() {
            return Err(ClientError::validation("device id is empty"));
        }
        if commands.is_empty() {
            return Err(ClientError::validation("no commands to send"));
        }
        if let Some(blank) = commands.iter().find(|c| c.code.trim().is_empty()) {
            return Err(ClientError::validation(format!(
                "command with empty code (value {:?})",
                blank.value
            )));
        }

        let path = format!("/v1.0/devices/{}/commands", encode_segment(device_id));
        tracing::info!("Sending {} command(s) to {}", commands.len(), device_id);
        self.transport.post(&path, &CommandRequest { commands }).await
    }

    /// Project statistics. The body is returned untouched.
    pub async fn get_statistics(&self) -> Result<Value> {
        tracing::info!("Requesting device statistics");
        self.transport
            .call_raw(reqwest::Method::GET, STATISTICS_PATH, None)
            .await
    }

    /// Every device bound to the linked account, following `has_more`.
    pub async fn list_user_devices(&self, page_size: u32) -> Result<Vec<Device>> {
        let credential = self.transport.credential().await?;
        if credential.uid.is_empty() {
            return Err(ClientError::Authentication {
                code: None,
                message: "token has no linked account uid".to_string(),
            });
        }
        let uid = encode_segment(&credential.uid);

        let mut all = Vec::new();
        for page_no in 1..=MAX_USER_DEVICE_PAGES {
            let path = format!(
                "/v1.0/users/{}/devices?page_no={}&page_size={}",
                uid, page_no, page_size
            );
            let value = self.transport.call_raw(reqwest::Method::GET, &path, None).await?;
            let envelope: Envelope<UserDevicePage> = decode_envelope(value)?;
            if !envelope.success {
                return Err(ClientError::Api {
                    code: envelope.code.unwrap_or_default(),
                    message: envelope.failure_message(),
                });
            }

            let page = envelope.result.unwrap_or_default();
            let count = page.devices.len();
            all.extend(devices_from(page.devices));

            if !page.has_more || count == 0 {
                break;
            }
        }

        tracing::debug!("Listed {} user devices", all.len());
        Ok(all)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserDevicePage {
    devices: Vec<Value>,
    has_more: bool,
}

/// Normalise the listing response into a [`DeviceList`].
pub(crate) fn parse_device_list(value: Value) -> DeviceList {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    let code = value.get("code").and_then(Value::as_i64);
    let msg = value.get("msg").and_then(Value::as_str).map(str::to_string);
    let t = value.get("t").and_then(Value::as_i64).unwrap_or_default();
    let tid = value.get("tid").and_then(Value::as_str).map(str::to_string);

    let entries = match value.get("result") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(holder)) => match holder.get("list") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    DeviceList {
        success,
        code,
        msg,
        t,
        tid,
        devices: devices_from(entries),
    }
}

fn devices_from(entries: Vec<Value>) -> Vec<Device> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Device>(entry) {
            Ok(device) if !device.id.trim().is_empty() => Some(device),
            Ok(_) => {
                tracing::debug!("Skipping device entry without id");
                None
            }
            Err(e) => {
                tracing::debug!("Skipping unreadable device entry: {}", e);
                None
            }
        })
        .collect()
}
