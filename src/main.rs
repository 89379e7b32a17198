use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use callback::{HttpCallbackSender, DEFAULT_CALLBACK_TIMEOUT};
use lambda_runtime::{service_fn, tracing, LambdaEvent};
use mailbox_s3::S3Mailbox;
use model::Error;
use probe_lambda::LambdaInvoker;
use schedule_eventbridge::EventBridgeScheduler;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use waiter::config::WaiterConfig;
use waiter::runtime::WaiterRuntime;
use waiter::waiter_fn;

// A tick is the only retry, so SDK calls fail fast
const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config: WaiterConfig = WaiterConfig::from_env()?;

    let sdk_config: SdkConfig = aws_config::defaults(BehaviorVersion::latest())
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(OPERATION_TIMEOUT)
                .build(),
        )
        .retry_config(RetryConfig::disabled())
        .load()
        .await;

    let credentials: SharedCredentialsProvider = sdk_config
        .credentials_provider()
        .ok_or("No AWS credentials provider configured")?;

    let mailbox: Arc<S3Mailbox> = Arc::new(S3Mailbox::new(
        aws_sdk_s3::Client::new(&sdk_config),
        credentials,
        config.bucket_name.clone(),
    ));

    tracing::info!(bucket = %config.bucket_name, prefix = %config.bucket_prefix, "Starting probe waiter");

    let runtime: Arc<WaiterRuntime> = Arc::new(WaiterRuntime::new(
        config,
        Arc::new(EventBridgeScheduler::new(aws_sdk_eventbridge::Client::new(&sdk_config))),
        mailbox.clone(),
        mailbox,
        Arc::new(LambdaInvoker::new(aws_sdk_lambda::Client::new(&sdk_config))),
        Arc::new(HttpCallbackSender::new(DEFAULT_CALLBACK_TIMEOUT)?),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let runtime: Arc<WaiterRuntime> = runtime.clone();

        async move { waiter_fn(&runtime, event).await }
    }))
    .await
}
