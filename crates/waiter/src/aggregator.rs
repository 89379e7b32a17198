//! One tick of a wait: read every slot, decide, and re-dispatch what is
//! still pending.

use crate::dispatcher::ProbeDispatcher;
use crate::error::WaiterError;
use chrono::{DateTime, Utc};
use lambda_runtime::tracing;
use mailbox::{slot_key, Mailbox};
use model::WaitStatus;
use model::probe::{ProbeResult, ProbeSlot, ProbeStatus};
use model::wait::WaitState;
use serde_json::{Map, Value};

pub const NOTHING_TO_PROBE: &str = "Timeout expired without probing anything";
pub const ALL_SUCCEEDED: &str = "All probes returned SUCCESS";
pub const TIMED_OUT: &str = "TIMEOUT";

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Keep the schedule and look again on the next tick.
    Continue,
    Terminal(Terminal),
}

/// How a wait ended, and the probe data collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    pub status: WaitStatus,
    pub message: String,
    pub data: Map<String, Value>,
}

impl Terminal {
    pub fn new(status: WaitStatus, message: impl Into<String>) -> Self {
        Terminal {
            status,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Terminal::new(WaitStatus::Failed, message)
    }

    fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

pub struct MailboxAggregator<'a> {
    pub(crate) mailbox: &'a dyn Mailbox,
    pub(crate) dispatcher: ProbeDispatcher<'a>,
    pub(crate) bucket_prefix: &'a str,
}

impl MailboxAggregator<'_> {
    pub async fn tick(&self, wait: &WaitState, now: DateTime<Utc>) -> Result<TickOutcome, WaiterError> {
        if wait.probes().is_empty() {
            if wait.is_expired(now) {
                return Ok(TickOutcome::Terminal(Terminal::new(
                    WaitStatus::Success,
                    NOTHING_TO_PROBE,
                )));
            }

            tracing::debug!("Nothing to probe, waiting for {}", wait.expire_time);
            return Ok(TickOutcome::Continue);
        }

        let slots: Vec<ProbeSlot> = wait.probe_slots();
        let mut succeeded: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut pending: Vec<ProbeSlot> = Vec::new();
        let mut data: Map<String, Value> = Map::new();

        for slot in &slots {
            let key: String = slot_key(self.bucket_prefix, &wait.rule_name, slot);

            let result: ProbeResult = match self.mailbox.read(&key).await {
                Ok(result) if result.is_for(wait.request_id()) => result,
                Ok(result) => {
                    tracing::info!(
                        key = %key,
                        "Ignoring result written for request {:?}",
                        result.request_id
                    );
                    pending.push(slot.clone());
                    continue;
                }
                Err(err) if err.is_not_found() => {
                    tracing::debug!(key = %key, "No result yet");
                    pending.push(slot.clone());
                    continue;
                }
                Err(err) => {
                    tracing::warn!("Treating slot as pending: {err}");
                    pending.push(slot.clone());
                    continue;
                }
            };

            if let Some(response_data) = result.response_data.clone() {
                tracing::info!(probe = %slot.name(), "Probe response data: {response_data}");
                data.insert(slot.name(), response_data);
            }

            match result.status() {
                ProbeStatus::Success => succeeded.push(slot.name()),
                ProbeStatus::Failed => failed.push(slot.name()),
                ProbeStatus::Pending => pending.push(slot.clone()),
            }
        }

        tracing::info!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            pending = pending.len(),
            "Read {} probe slot(s)",
            slots.len()
        );

        if !failed.is_empty() {
            let message: String = format!("Probe(s) {} returned FAILED", failed.join(", "));
            return Ok(TickOutcome::Terminal(Terminal::failed(message).with_data(data)));
        }

        if succeeded.len() == slots.len() {
            return Ok(TickOutcome::Terminal(
                Terminal::new(WaitStatus::Success, ALL_SUCCEEDED).with_data(data),
            ));
        }

        if wait.is_expired(now) {
            return Ok(TickOutcome::Terminal(
                Terminal::new(WaitStatus::Timeout, TIMED_OUT).with_data(data),
            ));
        }

        // Same slots, fresh credentials
        self.dispatcher.dispatch(wait, &pending).await?;

        Ok(TickOutcome::Continue)
    }
}
