//! Core types for ESignage

use serde::{Deserialize, Serialize};

/// An operator account. Authentication happens in a fronting session layer;
/// this service only resolves the authenticated username to a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: i64,
    pub username: String,
    pub created_at: i64,
}

/// Durable representation of one physical display unit and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub update_interval_seconds: u32,
    pub rotate_interval_seconds: u32,
    /// Long-lived opaque secret the device presents on every configuration
    /// fetch. Assigned at creation, never reissued.
    pub device_token: String,
    pub created_at: i64,
}

/// Default timing parameters for newly created devices.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u32 = 60;
pub const DEFAULT_ROTATE_INTERVAL_SECS: u32 = 10;

/// Maximum length of a display message text.
pub const MAX_MESSAGE_LEN: usize = 512;

/// One message shown on a device's display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub id: i64,
    pub device_id: i64,
    pub text: String,
    pub font_size: i32,
    pub scroll: bool,
}

/// A registration token issued to an operator at provisioning time.
/// Single-use: `used` is flipped atomically by the confirm step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub id: i64,
    pub token: String,
    pub operator_id: i64,
    pub created_at: i64,
    pub used: bool,
}

/// Network defaults shared by every device. Persisted as a singleton row,
/// lazily seeded from the server configuration on first read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDefaults {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub ntp_server: String,
    pub server_domain: String,
}

/// The bundle returned once per provisioning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub ntp_server: String,
    pub server_domain: String,
    pub registration_token: String,
    pub device_id: i64,
    pub device_token: String,
}

/// The derived configuration snapshot a device fetches on every poll.
/// Never persisted, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPayload {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub ntp_server: String,
    pub server_domain: String,
    pub device_id: i64,
    pub device_token: String,
    pub update_interval_seconds: u32,
    pub rotate_interval_seconds: u32,
    pub messages: Vec<MessagePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub text: String,
    pub font_size: i32,
    pub scroll: bool,
}

impl From<&DisplayMessage> for MessagePayload {
    fn from(m: &DisplayMessage) -> Self {
        Self {
            text: m.text.clone(),
            font_size: m.font_size,
            scroll: m.scroll,
        }
    }
}
