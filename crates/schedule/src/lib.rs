use ::model::Error;
use async_trait::async_trait;

/// Manage the external timer which keeps a wait alive between invocations.
///
/// A schedule is a rate based rule named after the wait, bound to exactly one
/// target. The target input is the serialized tick payload, which is the only
/// place a wait's state lives between ticks.
#[async_trait]
pub trait ScheduleManager: Send + Sync {
    /// Create or update the rule and replace its target.
    /// Installing twice under the same name never duplicates the target.
    async fn install(
        &self,
        rule_name: &str,
        period_minutes: u32,
        target: ScheduleTarget,
    ) -> Result<(), ScheduleError>;

    /// Detach every target and delete the rule. A missing rule is not an error.
    async fn remove(&self, rule_name: &str) -> Result<(), ScheduleError>;

    async fn exists(&self, rule_name: &str) -> Result<bool, ScheduleError>;
}

/// Fixed id of the single target bound to every rule.
pub const TARGET_ID: &str = "Self";

/// The function invoked on every tick and the payload it receives.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTarget {
    pub arn: String,
    pub input: String,
}

/// EventBridge style rate expression for a period in minutes.
pub fn rate_expression(period_minutes: u32) -> String {
    match period_minutes {
        1 => "rate(1 minute)".to_string(),
        minutes => format!("rate({minutes} minutes)"),
    }
}

/// Errors arising from managing a schedule.
#[derive(Debug, thiserror::Error)]
#[error("{operation:?} failed for schedule {rule_name}: {reason}")]
pub struct ScheduleError {
    pub rule_name: String,

    pub operation: ScheduleOperation,
    pub reason: ScheduleErrorReason,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleErrorReason {
    // The backend refused part of the request
    #[error("rejected: {0}")]
    Rejected(String),
    // An error from the underlying scheduler
    #[error("backend failure: {0}")]
    BackendFailure(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOperation {
    PutRule,
    PutTargets,
    ListTargets,
    RemoveTargets,
    DeleteRule,
    DescribeRule,
}

impl ScheduleError {
    pub fn new(rule_name: &str, operation: ScheduleOperation, reason: ScheduleErrorReason) -> Self {
        ScheduleError {
            rule_name: rule_name.to_string(),
            operation,
            reason,
        }
    }

    pub fn backend(rule_name: &str, operation: ScheduleOperation, err: impl Into<Error>) -> Self {
        ScheduleError::new(rule_name, operation, ScheduleErrorReason::BackendFailure(err.into()))
    }
}
