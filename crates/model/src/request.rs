use crate::probe::ProbeDescriptor;
use crate::wait::SourceEvent;
use crate::{ConfigError, InvocationId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// A CloudFormation custom resource request.
/// Fields this function has no use for (`ServiceToken`, `ResourceType`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub resource_properties: Value,
}

impl CustomResourceRequest {
    /// The part of the request carried through every tick.
    pub fn source_event(&self) -> SourceEvent {
        SourceEvent {
            response_url: self.response_url.clone(),
            stack_id: self.stack_id.clone(),
            request_id: self.request_id.clone(),
            resource_properties: self.resource_properties.clone(),
            logical_resource_id: self.logical_resource_id.clone(),
        }
    }
}

impl InvocationId for CustomResourceRequest {
    fn invocation_id(&self) -> &str {
        &self.request_id
    }
}

/// Resource properties understood by the waiter.
///
/// CloudFormation passes every scalar property as a string, so numbers are
/// accepted in either form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitProperties {
    #[serde(default)]
    pub probes: Vec<ProbeDescriptor>,
    #[serde(default, deserialize_with = "lenient::optional_int")]
    pub timeout_in_minutes: Option<i64>,
    #[serde(default = "default_one", deserialize_with = "lenient::int")]
    pub success_count: i64,
    #[serde(default = "default_one", deserialize_with = "lenient::int")]
    pub pause_time_in_minutes: i64,
    #[serde(default, deserialize_with = "lenient::optional_int")]
    pub url_expiry_in_minutes: Option<i64>,
}

fn default_one() -> i64 {
    1
}

impl WaitProperties {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Ok(serde_json::from_value(Value::Object(Default::default()))?),
            other => Ok(WaitProperties::deserialize(other)?),
        }
    }

    /// A success count of zero or less skips the wait entirely.
    pub fn bypass(&self) -> bool {
        self.success_count <= 0
    }

    pub fn timeout(&self) -> Result<TimeDelta, ConfigError> {
        let minutes: i64 = self
            .timeout_in_minutes
            .ok_or(ConfigError::MissingProperty("TimeoutInMinutes"))?;

        if minutes < 0 {
            return Err(ConfigError::InvalidProperty {
                property: "TimeoutInMinutes",
                reason: format!("{minutes} is negative"),
            });
        }

        TimeDelta::try_minutes(minutes).ok_or_else(|| ConfigError::InvalidProperty {
            property: "TimeoutInMinutes",
            reason: format!("{minutes} is out of range"),
        })
    }

    /// Deadline of a wait started at `now`.
    pub fn expire_time(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        let timeout: TimeDelta = self.timeout()?;

        now.checked_add_signed(timeout)
            .ok_or_else(|| ConfigError::InvalidProperty {
                property: "TimeoutInMinutes",
                reason: format!("{} minutes from now is out of range", timeout.num_minutes()),
            })
    }

    pub fn pause_minutes(&self) -> Result<u32, ConfigError> {
        u32::try_from(self.pause_time_in_minutes)
            .ok()
            .filter(|minutes| *minutes >= 1)
            .ok_or_else(|| ConfigError::InvalidProperty {
                property: "PauseTimeInMinutes",
                reason: format!("{} is not a positive number", self.pause_time_in_minutes),
            })
    }

    /// Upload descriptor lifetime, falling back to the process wide default.
    pub fn url_expiry(&self, default: TimeDelta) -> Result<TimeDelta, ConfigError> {
        match self.url_expiry_in_minutes {
            None => Ok(default),
            Some(minutes) => url_expiry_minutes(minutes).map_err(|reason| {
                ConfigError::InvalidProperty {
                    property: "UrlExpiryInMinutes",
                    reason,
                }
            }),
        }
    }
}

/// Longest lifetime SigV4 allows for pre-signed credentials.
pub const MAX_URL_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

/// Upload descriptor lifetime of `minutes`, within `1..=MAX_URL_EXPIRY_MINUTES`.
pub fn url_expiry_minutes(minutes: i64) -> Result<TimeDelta, String> {
    if !(1..=MAX_URL_EXPIRY_MINUTES).contains(&minutes) {
        return Err(format!(
            "{minutes} is not between 1 and {MAX_URL_EXPIRY_MINUTES} minutes"
        ));
    }

    Ok(TimeDelta::minutes(minutes))
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    impl IntOrString {
        fn into_int<E: Error>(self) -> Result<i64, E> {
            match self {
                IntOrString::Int(value) => Ok(value),
                IntOrString::Str(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("expected an integer, got {raw:?}"))),
            }
        }
    }

    pub(super) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        IntOrString::deserialize(deserializer)?.into_int()
    }

    pub(super) fn optional_int<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        Option::<IntOrString>::deserialize(deserializer)?
            .map(IntOrString::into_int)
            .transpose()
    }
}
