use crate::error::WaiterError;
use chrono::TimeDelta;
use lambda_runtime::tracing;
use mailbox::{slot_key, MailboxUrlIssuer};
use model::probe::{ProbeInvocation, ProbeSlot, UploadDescriptor};
use model::wait::WaitState;
use probe::{is_accepted, ProbeError, ProbeInvoker};

/// Hands every probe a fresh write credential for its slot and starts it.
pub struct ProbeDispatcher<'a> {
    pub(crate) issuer: &'a dyn MailboxUrlIssuer,
    pub(crate) invoker: &'a dyn ProbeInvoker,
    pub(crate) bucket_prefix: &'a str,
    pub(crate) default_url_expiry: TimeDelta,
}

impl ProbeDispatcher<'_> {
    /// Dispatch `slots` in order, stopping at the first probe that can't be started.
    pub async fn dispatch(&self, wait: &WaitState, slots: &[ProbeSlot]) -> Result<(), WaiterError> {
        let unsupported: Vec<&str> = wait.unsupported_providers();
        if !unsupported.is_empty() {
            tracing::info!("Skipping unsupported probe provider(s) {}", unsupported.join(", "));
        }

        let expires_in: TimeDelta = wait.properties.url_expiry(self.default_url_expiry)?;

        for slot in slots {
            let function_name: &str = slot.service_token()?;
            let key: String = slot_key(self.bucket_prefix, &wait.rule_name, slot);
            let upload: UploadDescriptor = self.issuer.issue(&key, expires_in).await?;

            let invocation: ProbeInvocation = ProbeInvocation::status_update(
                slot,
                upload,
                wait.request_id(),
                &wait.source_event.stack_id,
            );
            let status_code: i32 = self
                .invoker
                .invoke(function_name, serde_json::to_string(&invocation)?)
                .await?;

            if !is_accepted(status_code) {
                return Err(ProbeError::Rejected {
                    function_name: function_name.to_string(),
                    status_code,
                }
                .into());
            }

            tracing::info!(probe = %slot.name(), function_name, key = %key, "Dispatched probe");
        }

        Ok(())
    }
}
