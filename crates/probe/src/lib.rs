use ::model::Error;
use async_trait::async_trait;

/// Status codes an asynchronous invocation may be accepted with.
/// Event invocations should answer 202, in practice 200 is seen as well.
pub const ACCEPTED_STATUS_CODES: [i32; 3] = [200, 201, 202];

/// Starts a probe without waiting for it to finish.
/// The probe reports back through its mailbox slot, never through this call.
#[async_trait]
pub trait ProbeInvoker: Send + Sync {
    /// Returns the status code the invocation was accepted with.
    async fn invoke(&self, function_name: &str, payload: String) -> Result<i32, ProbeError>;
}

pub fn is_accepted(status_code: i32) -> bool {
    ACCEPTED_STATUS_CODES.contains(&status_code)
}

/// Errors arising from dispatching a probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    // The invocation could not be made
    #[error("failed to invoke {function_name}: {source}")]
    InvocationFailed { function_name: String, source: Error },
    // The invocation was answered with an unexpected status
    #[error("failed to invoke {function_name}: status code {status_code}")]
    Rejected {
        function_name: String,
        status_code: i32,
    },
}
