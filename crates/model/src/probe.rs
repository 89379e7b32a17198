use crate::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The only provider kind probes are currently dispatched for.
pub const LAMBDA_PROVIDER: &str = "Lambda";
/// Request type sent to every probe.
pub const STATUS_UPDATE: &str = "StatusUpdate";

const SERVICE_TOKEN: &str = "ServiceToken";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeDescriptor {
    pub provider: String,
    #[serde(default)]
    pub properties: Value,
}

impl ProbeDescriptor {
    pub fn is_supported(&self) -> bool {
        self.provider == LAMBDA_PROVIDER
    }
}

/// A supported probe and the mailbox slot reserved for it.
///
/// The index is the position in the full probe list, so a probe keeps its
/// slot across ticks as long as the list travels unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSlot {
    pub index: usize,
    pub properties: Value,
}

impl ProbeSlot {
    pub fn name(&self) -> String {
        format!("lambda-probe-{}", self.index)
    }

    /// Name or ARN of the function implementing the probe.
    pub fn service_token(&self) -> Result<&str, ConfigError> {
        self.properties
            .get(SERVICE_TOKEN)
            .and_then(Value::as_str)
            .ok_or(ConfigError::MissingProperty(SERVICE_TOKEN))
    }
}

/// Pre-signed POST data allowing one unauthenticated upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadDescriptor {
    pub url: String,
    pub form_data: BTreeMap<String, String>,
}

/// Payload each probe is invoked with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeInvocation {
    pub request_type: String,
    pub resource_properties: Value,
    pub response_url_data: UploadDescriptor,
    pub request_id: String,
    pub stack_id: String,
}

impl ProbeInvocation {
    pub fn status_update(
        slot: &ProbeSlot,
        response_url_data: UploadDescriptor,
        request_id: &str,
        stack_id: &str,
    ) -> Self {
        ProbeInvocation {
            request_type: STATUS_UPDATE.to_string(),
            resource_properties: slot.properties.clone(),
            response_url_data,
            request_id: request_id.to_string(),
            stack_id: stack_id.to_string(),
        }
    }
}

/// Object a probe uploads into its mailbox slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeResult {
    #[serde(default)]
    pub response_status: Option<String>,
    #[serde(default)]
    pub response_data: Option<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Success,
    Failed,
    Pending,
}

impl ProbeResult {
    pub fn new(status: &str, request_id: &str, response_data: Option<Value>) -> Self {
        ProbeResult {
            response_status: Some(status.to_string()),
            response_data,
            request_id: Some(request_id.to_string()),
        }
    }

    /// Whether this object was written for the given request.
    pub fn is_for(&self, request_id: &str) -> bool {
        self.request_id.as_deref() == Some(request_id)
    }

    pub fn status(&self) -> ProbeStatus {
        match self.response_status.as_deref() {
            Some("SUCCESS") => ProbeStatus::Success,
            Some("FAILED") => ProbeStatus::Failed,
            _ => ProbeStatus::Pending,
        }
    }
}
