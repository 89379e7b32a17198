use crate::probe::{ProbeDescriptor, ProbeSlot};
use crate::request::WaitProperties;
use crate::{ConfigError, InvocationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capture of the original request, carried unmodified through every tick
/// so the final callback can be addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceEvent {
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_properties: Value,
    pub logical_resource_id: String,
}

impl InvocationId for SourceEvent {
    fn invocation_id(&self) -> &str {
        &self.request_id
    }
}

/// Input bound to the schedule target, delivered back on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TickEvent {
    pub name: String,
    pub source_event: SourceEvent,
    pub expire_time: DateTime<Utc>,
}

impl InvocationId for TickEvent {
    fn invocation_id(&self) -> &str {
        self.source_event.invocation_id()
    }
}

/// One outstanding wait, rebuilt from the tick payload on every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitState {
    pub rule_name: String,
    pub source_event: SourceEvent,
    pub expire_time: DateTime<Utc>,
    pub properties: WaitProperties,
}

impl WaitState {
    pub fn new(
        rule_name: String,
        source_event: SourceEvent,
        expire_time: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let properties: WaitProperties =
            WaitProperties::from_value(&source_event.resource_properties)?;

        Ok(WaitState {
            rule_name,
            source_event,
            expire_time,
            properties,
        })
    }

    pub fn from_tick(tick: TickEvent) -> Result<Self, ConfigError> {
        WaitState::new(tick.name, tick.source_event, tick.expire_time)
    }

    pub fn to_tick(&self) -> TickEvent {
        TickEvent {
            name: self.rule_name.clone(),
            source_event: self.source_event.clone(),
            expire_time: self.expire_time,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.source_event.request_id
    }

    pub fn probes(&self) -> &[ProbeDescriptor] {
        &self.properties.probes
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_time
    }

    /// Slots for every probe of a supported provider, in list order.
    pub fn probe_slots(&self) -> Vec<ProbeSlot> {
        self.probes()
            .iter()
            .enumerate()
            .filter(|(_, probe)| probe.is_supported())
            .map(|(index, probe)| ProbeSlot {
                index,
                properties: probe.properties.clone(),
            })
            .collect()
    }

    pub fn unsupported_providers(&self) -> Vec<&str> {
        self.probes()
            .iter()
            .filter(|probe| !probe.is_supported())
            .map(|probe| probe.provider.as_str())
            .collect()
    }
}
