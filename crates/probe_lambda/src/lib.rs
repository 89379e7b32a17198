use async_trait::async_trait;
use aws_sdk_lambda::operation::invoke::InvokeOutput;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{InvocationType, LogType};
use lambda_runtime::tracing;
use probe::{ProbeError, ProbeInvoker};

/// Invokes probe functions with the `Event` invocation type.
pub struct LambdaInvoker {
    lambda_client: aws_sdk_lambda::Client,
}

impl LambdaInvoker {
    pub fn new(lambda_client: aws_sdk_lambda::Client) -> Self {
        LambdaInvoker { lambda_client }
    }
}

#[async_trait]
impl ProbeInvoker for LambdaInvoker {
    async fn invoke(&self, function_name: &str, payload: String) -> Result<i32, ProbeError> {
        let output: InvokeOutput = self
            .lambda_client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::Event)
            .log_type(LogType::None)
            .payload(Blob::new(payload.into_bytes()))
            .send()
            .await
            .map_err(|err| ProbeError::InvocationFailed {
                function_name: function_name.to_string(),
                source: err.into(),
            })?;

        tracing::debug!(function_name, status_code = output.status_code(), "Invoked probe");

        Ok(output.status_code())
    }
}
