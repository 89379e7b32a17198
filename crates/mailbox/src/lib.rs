use ::model::Error;
use async_trait::async_trait;
use chrono::TimeDelta;
use model::probe::{ProbeResult, ProbeSlot, UploadDescriptor};

/// Read side of the mailbox. Each wait only ever reads its own slots.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn read(&self, key: &str) -> Result<ProbeResult, MailboxError>;
}

/// Issues write-only credentials scoped to a single mailbox key.
#[async_trait]
pub trait MailboxUrlIssuer: Send + Sync {
    async fn issue(&self, key: &str, expires_in: TimeDelta)
    -> Result<UploadDescriptor, MailboxError>;
}

/// Key of a probe's slot: `{prefix}/{rule_name}/{slot}`, prefix optional.
pub fn slot_key(prefix: &str, rule_name: &str, slot: &ProbeSlot) -> String {
    let prefix: &str = prefix.trim_matches('/');

    if prefix.is_empty() {
        format!("{rule_name}/{}", slot.name())
    } else {
        format!("{prefix}/{rule_name}/{}", slot.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("mailbox slot {key}: {reason}")]
pub struct MailboxError {
    pub key: String,
    pub reason: MailboxErrorReason,
}

#[derive(Debug, thiserror::Error)]
pub enum MailboxErrorReason {
    // Nothing has been written to the slot yet
    #[error("not found")]
    NotFound,
    // The slot holds something other than a probe result
    #[error("malformed object: {0}")]
    Malformed(String),
    // The credential would outlive what can be expressed
    #[error("expiry of {0} is out of range")]
    ExpiryOutOfRange(TimeDelta),
    // An error from the underlying store
    #[error("backend failure: {0}")]
    BackendFailure(Error),
}

impl MailboxError {
    pub fn new(key: &str, reason: MailboxErrorReason) -> Self {
        MailboxError {
            key: key.to_string(),
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.reason, MailboxErrorReason::NotFound)
    }
}
