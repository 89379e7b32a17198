use crate::request::CustomResourceRequest;
use crate::wait::TickEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod callback;
pub mod env;
pub mod probe;
pub mod request;
pub mod resource_name;
pub mod wait;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// This id is used for tracing and for gating mailbox reads.
pub trait InvocationId {
    fn invocation_id(&self) -> &str;
}

/// Errors arising from malformed or missing input on a request or tick.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required property {0}")]
    MissingProperty(&'static str),
    #[error("missing environment variable {0}")]
    MissingVariable(&'static str),
    #[error("invalid value for {property}: {reason}")]
    InvalidProperty {
        property: &'static str,
        reason: String,
    },
    #[error("unrecognised event, expected a custom resource request or a tick")]
    UnrecognisedEvent,
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Where a wait ended up once it stops ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitStatus {
    Success,
    Failed,
    Timeout,
}

/// The two shapes this function is invoked with.
/// CloudFormation sends requests, the schedule sends ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum WaiterEvent {
    Request(CustomResourceRequest),
    Tick(TickEvent),
}

const SOURCE_EVENT: &str = "SourceEvent";
const REQUEST_TYPE: &str = "RequestType";

impl WaiterEvent {
    /// Ticks are told apart by their `SourceEvent` field.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if value.get(SOURCE_EVENT).is_some() {
            return Ok(WaiterEvent::Tick(serde_json::from_value(value)?));
        }
        if value.get(REQUEST_TYPE).is_some() {
            return Ok(WaiterEvent::Request(serde_json::from_value(value)?));
        }

        Err(ConfigError::UnrecognisedEvent)
    }
}

impl InvocationId for WaiterEvent {
    fn invocation_id(&self) -> &str {
        match self {
            WaiterEvent::Request(request) => request.invocation_id(),
            WaiterEvent::Tick(tick) => tick.invocation_id(),
        }
    }
}
