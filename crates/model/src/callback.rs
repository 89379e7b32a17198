use crate::WaitStatus;
use crate::wait::SourceEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl From<WaitStatus> for CallbackStatus {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Success => CallbackStatus::Success,
            WaitStatus::Failed | WaitStatus::Timeout => CallbackStatus::Failed,
        }
    }
}

/// Body PUT to the CloudFormation response URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackResponse {
    pub status: CallbackStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

impl CallbackResponse {
    /// The logical id doubles as physical id so updates never force a replacement.
    pub fn new(
        source: &SourceEvent,
        status: CallbackStatus,
        reason: String,
        data: Map<String, Value>,
    ) -> Self {
        CallbackResponse {
            status,
            reason,
            physical_resource_id: source.logical_resource_id.clone(),
            stack_id: source.stack_id.clone(),
            request_id: source.request_id.clone(),
            logical_resource_id: source.logical_resource_id.clone(),
            no_echo: false,
            data,
        }
    }
}
