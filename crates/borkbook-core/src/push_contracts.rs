use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const NOTIFICATION_TITLE: &str = "BorkBook";
pub const ROUTING_DATA_KEY: &str = "click_action";
pub const ROUTING_DATA_VALUE: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Opaque recipient identifier, e.g. an FCM registration token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    /// Blank input is rejected; anything else is kept byte for byte.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidHandle);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single-recipient notification as handed to a push provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: DeviceHandle,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn for_recipient(token: DeviceHandle, body: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert(ROUTING_DATA_KEY.to_string(), ROUTING_DATA_VALUE.to_string());
        Self {
            token,
            title: NOTIFICATION_TITLE.to_string(),
            body: body.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub success_count: usize,
    pub failure_count: usize,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Nothing got through; the facade treats this as a provider outage.
    pub fn all_failed(&self) -> bool {
        self.success_count == 0 && self.failure_count > 0
    }
}
