use callback::CallbackSender;
use lambda_runtime::tracing;
use model::callback::{CallbackResponse, CallbackStatus};
use model::wait::SourceEvent;
use schedule::ScheduleManager;
use serde_json::{Map, Value};

const MESSAGE: &str = "Message";

pub(crate) fn reason(log_stream_name: &str, status: CallbackStatus, message: &str) -> String {
    let details: String = format!("See the details in CloudWatch Log Stream: {log_stream_name}");

    match status {
        CallbackStatus::Success => details,
        CallbackStatus::Failed => format!("{message}. {details}"),
    }
}

/// `data` with the terminal message stored under `Message`.
pub(crate) fn with_message(message: &str, mut data: Map<String, Value>) -> Map<String, Value> {
    data.insert(MESSAGE.to_string(), Value::String(message.to_string()));
    data
}

/// Send the response once. Delivery failures are logged, never retried.
pub(crate) async fn respond(
    callback: &dyn CallbackSender,
    source: &SourceEvent,
    status: CallbackStatus,
    reason: String,
    data: Map<String, Value>,
) {
    let response: CallbackResponse = CallbackResponse::new(source, status, reason, data);

    if let Err(err) = callback.send(&source.response_url, &response).await {
        tracing::error!("Failed to send {status:?} callback: {err}");
    }
}

/// Remove the schedule, logging any failure. Removing a missing schedule is a no-op.
pub(crate) async fn remove_schedule(scheduler: &dyn ScheduleManager, rule_name: &str) {
    if let Err(err) = scheduler.remove(rule_name).await {
        tracing::error!("Failed to remove schedule: {err}");
    }
}
