use async_trait::async_trait;
use borkbook_core::PushMessage;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// FCM error codes that mean the token will never work again.
const INVALID_RECIPIENT_CODES: [&str; 3] = ["UNREGISTERED", "INVALID_ARGUMENT", "SENDER_ID_MISMATCH"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("recipient is not registered with the push provider: {0}")]
    InvalidRecipient(String),
    #[error("push provider failure: {0}")]
    Transient(String),
}

impl ProviderError {
    pub fn is_invalid_recipient(&self) -> bool {
        matches!(self, ProviderError::InvalidRecipient(_))
    }
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Stable provider identifier for logs.
    fn id(&self) -> &'static str;

    /// Deliver one message to one recipient.
    async fn send(&self, message: &PushMessage) -> Result<(), ProviderError>;
}

/// Stand-in used when no push credentials are configured.
pub struct UnconfiguredProvider;

#[async_trait]
impl PushProvider for UnconfiguredProvider {
    fn id(&self) -> &'static str {
        "unconfigured"
    }

    async fn send(&self, _message: &PushMessage) -> Result<(), ProviderError> {
        Err(ProviderError::Transient(
            "push provider is not configured".to_string(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub endpoint: String,
    pub project_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            project_id: project_id.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Firebase Cloud Messaging over the HTTP v1 API.
pub struct FcmProvider {
    config: FcmConfig,
    client: reqwest::Client,
}

impl FcmProvider {
    pub fn new(config: FcmConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Transient(err.to_string()))?;
        Ok(Self { config, client })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project_id
        )
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    fn id(&self) -> &'static str {
        "fcm"
    }

    async fn send(&self, message: &PushMessage) -> Result<(), ProviderError> {
        let body = json!({
            "message": {
                "token": message.token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });
        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), &text))
    }
}

#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
}

pub(crate) fn classify_failure(status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<FcmErrorEnvelope>(body).ok();
    let Some(envelope) = parsed else {
        let message = format!("HTTP {status}: {}", body.trim());
        return if status == 404 {
            ProviderError::InvalidRecipient(message)
        } else {
            ProviderError::Transient(message)
        };
    };

    let error_code = envelope
        .error
        .details
        .iter()
        .find_map(|detail| detail.error_code.clone())
        .unwrap_or_else(|| envelope.error.status.clone());
    let message = format!("HTTP {status} {error_code}: {}", envelope.error.message);

    if status == 404 || INVALID_RECIPIENT_CODES.contains(&error_code.as_str()) {
        ProviderError::InvalidRecipient(message)
    } else {
        ProviderError::Transient(message)
    }
}
