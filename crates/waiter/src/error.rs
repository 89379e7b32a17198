use mailbox::MailboxError;
use model::ConfigError;
use probe::ProbeError;
use schedule::ScheduleError;

/// Anything that stops a request or a tick from making progress.
/// Every variant ends the wait with a FAILED callback.
#[derive(Debug, thiserror::Error)]
pub enum WaiterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] ProbeError),
    #[error("failed to issue upload credential: {0}")]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}
