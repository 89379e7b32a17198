use crate::runtime::{HandlerOutcome, WaiterRuntime};
use chrono::Utc;
use lambda_runtime::tracing::field::Empty;
use lambda_runtime::tracing::{Instrument, Span};
use lambda_runtime::{tracing, LambdaEvent};
use model::{Error, InvocationId, WaiterEvent};
use serde_json::Value;

pub mod aggregator;
mod cleanup;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod runtime;

/// Handler for use with `lambda_runtime::run()`.
///
/// Accepts both the CloudFormation custom resource request and the ticks
/// delivered by the schedule it installs. The function's own ARN, taken
/// from the invocation context, becomes the schedule target.
///
/// ```no_compile
/// let runtime: Arc<WaiterRuntime> = Arc::new(WaiterRuntime::new(config, ...));
///
/// lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
///     let runtime: Arc<WaiterRuntime> = runtime.clone();
///     async move { waiter_fn(&runtime, event).await }
/// }))
/// .await?;
/// ```
pub async fn waiter_fn(
    runtime: &WaiterRuntime,
    event: LambdaEvent<Value>,
) -> Result<HandlerOutcome, Error> {
    let (payload, context) = event.into_parts();

    let event: WaiterEvent = WaiterEvent::from_value(payload).map_err(|err| {
        tracing::error!("Rejecting event: {err}");
        err
    })?;

    let span: Span = tracing::info_span!(
        "Waiter",
        request_id = event.invocation_id(),
        rule_name = Empty
    );

    let outcome: HandlerOutcome = runtime
        .accept(event, &context.invoked_function_arn, Utc::now())
        .instrument(span)
        .await;

    tracing::info!("Finished invocation: {:?}", outcome);

    Ok(outcome)
}
