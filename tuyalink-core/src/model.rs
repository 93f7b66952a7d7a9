//! Wire and domain types.
//!
//! This module provides:
//! - [`Envelope`] - The `{success, code, msg, t, tid, result}` wrapper every call returns
//! - [`Device`] - One entry of the device listing
//! - [`DeviceStatus`] / [`StatusValue`] - Data-point readings and their dynamic values
//! - [`Command`] - A data-point write sent to a device
//! - [`MergedDevice`] / [`MergedDeviceList`] - The unified view returned to callers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response wrapper used by the cloud API.
///
/// `success` is authoritative: the provider may answer HTTP 200 with
/// `success: false` and an error `code`/`msg`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    /// Server timestamp in epoch millis.
    #[serde(default)]
    pub t: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    pub result: Option<T>,
}

impl<T> Envelope<T> {
    /// Build a successful envelope around `result`.
    pub fn ok(result: T, t: i64) -> Self {
        Self {
            success: true,
            code: None,
            msg: None,
            t,
            tid: None,
            result: Some(result),
        }
    }

    /// Human-readable failure description, e.g. `permission deny (code 1106)`.
    pub fn failure_message(&self) -> String {
        let msg = self.msg.as_deref().unwrap_or("unknown error");
        match self.code {
            Some(code) => format!("{} (code {})", msg, code),
            None => msg.to_string(),
        }
    }
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
}

/// A device as reported by the listing call.
///
/// Field names follow the provider's snake_case wire format. Entries without
/// an `id` are dropped during listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Device {
    pub id: String,
    pub name: Option<String>,
    pub product_name: Option<String>,
    pub model: Option<String>,
    pub ip: Option<String>,
    pub local_key: Option<String>,
    pub active_time: i64,
    pub create_time: i64,
    pub update_time: i64,
}

/// Dynamically typed data-point value.
///
/// Consumers that know what a given status code carries decode it with the
/// `as_*` accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StatusValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Structured values some categories report (arrays, objects).
    Json(Value),
}

impl StatusValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatusValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatusValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatusValue::Integer(i) => Some(*i as f64),
            StatusValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatusValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StatusValue::Null)
    }

    /// Parse a command-line style literal: `true`/`false`, integers,
    /// floats, `null`, otherwise a string.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return StatusValue::Bool(true),
            "false" => return StatusValue::Bool(false),
            "null" => return StatusValue::Null,
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return StatusValue::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return StatusValue::Float(f);
            }
        }
        StatusValue::Text(raw.to_string())
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        StatusValue::Bool(value)
    }
}

impl From<i64> for StatusValue {
    fn from(value: i64) -> Self {
        StatusValue::Integer(value)
    }
}

impl From<f64> for StatusValue {
    fn from(value: f64) -> Self {
        StatusValue::Float(value)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        StatusValue::Text(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        StatusValue::Text(value)
    }
}

/// One data-point reading, e.g. `switch_1 = true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceStatus {
    pub code: String,
    #[serde(default = "null_value")]
    pub value: StatusValue,
}

fn null_value() -> StatusValue {
    StatusValue::Null
}

/// A data-point write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub code: String,
    pub value: StatusValue,
}

impl Command {
    pub fn new(code: impl Into<String>, value: impl Into<StatusValue>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// Body of the command dispatch call.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommandRequest<'a> {
    pub commands: &'a [Command],
}

/// Result of the listing call after shape normalisation.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub success: bool,
    pub code: Option<i64>,
    pub msg: Option<String>,
    pub t: i64,
    pub tid: Option<String>,
    pub devices: Vec<Device>,
}

/// A device combined with its live status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedDevice {
    pub id: String,
    pub name: Option<String>,
    pub product_name: Option<String>,
    /// True when the status call for this device succeeded.
    pub online: bool,
    pub status: Vec<DeviceStatus>,
}

impl MergedDevice {
    /// Combine a listed device with its status result.
    pub fn new(device: &Device, online: bool, status: Vec<DeviceStatus>) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            product_name: device.product_name.clone(),
            online,
            status,
        }
    }

    /// Record for a device whose status could not be fetched.
    pub fn offline(device: &Device) -> Self {
        Self::new(device, false, Vec::new())
    }

    /// Look up one data point by code.
    pub fn status_value(&self, code: &str) -> Option<&StatusValue> {
        self.status.iter().find(|s| s.code == code).map(|s| &s.value)
    }
}

/// Aggregate result: an envelope whose `result` is always a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedDeviceList {
    pub result: Vec<MergedDevice>,
    pub success: bool,
    pub t: i64,
    pub tid: Option<String>,
    pub code: Option<i64>,
    pub msg: Option<String>,
}

impl MergedDeviceList {
    /// Successful result.
    pub fn ok(result: Vec<MergedDevice>, t: i64, tid: Option<String>) -> Self {
        Self {
            result,
            success: true,
            t,
            tid,
            code: None,
            msg: None,
        }
    }

    /// Failed, empty result carrying the provider's code and message.
    pub fn failed(code: Option<i64>, msg: Option<String>, t: i64, tid: Option<String>) -> Self {
        Self {
            result: Vec::new(),
            success: false,
            t,
            tid,
            code,
            msg,
        }
    }

    /// Look up a merged record by device id.
    pub fn get(&self, id: &str) -> Option<&MergedDevice> {
        self.result.iter().find(|d| d.id == id)
    }
}
