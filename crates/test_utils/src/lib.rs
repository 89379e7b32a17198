use async_trait::async_trait;
use callback::{CallbackError, CallbackSender};
use in_memory::InMemoryScheduler;
use lambda_runtime::{Context, LambdaEvent};
use model::callback::CallbackResponse;
use model::probe::ProbeInvocation;
use model::request::{CustomResourceRequest, RequestType};
use probe::{ProbeError, ProbeInvoker};
use schedule::ScheduleErrorReason::Rejected;
use schedule::ScheduleOperation::{DescribeRule, PutTargets};
use schedule::{ScheduleError, ScheduleManager, ScheduleTarget};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const STACK_ID: &str =
    "arn:aws:cloudformation:eu-west-1:123456789012:stack/demo/5b2f6c80-1d2e-11eb-9c8f-0a1b2c3d4e5f";
pub const LOGICAL_ID: &str = "Waiter";
/// Name composed from `STACK_ID` and `LOGICAL_ID`.
pub const RULE_NAME: &str = "demo-Waiter";
pub const REQUEST_ID: &str = "2f5b7c8e-0000-4000-8000-000000000001";
pub const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response.example/response";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:eu-west-1:123456789012:function:probe-waiter";

/// A custom resource request as CloudFormation would send it.
pub fn custom_resource_request(request_type: RequestType, properties: Value) -> CustomResourceRequest {
    CustomResourceRequest {
        request_type,
        response_url: RESPONSE_URL.to_string(),
        stack_id: STACK_ID.to_string(),
        request_id: REQUEST_ID.to_string(),
        logical_resource_id: LOGICAL_ID.to_string(),
        resource_properties: properties,
    }
}

/// Probe descriptor for a Lambda probe named `function_name`.
pub fn lambda_probe(function_name: &str) -> Value {
    json!({ "Provider": "Lambda", "Properties": { "ServiceToken": function_name } })
}

/// Wrap a payload the way the Lambda runtime hands it to the handler.
pub fn lambda_event(payload: Value) -> LambdaEvent<Value> {
    let mut context: Context = Context::default();
    context.invoked_function_arn = FUNCTION_ARN.to_string();

    LambdaEvent::new(payload, context)
}

/// Records every probe invocation and answers with a fixed status code.
#[derive(Clone)]
pub struct RecordingInvoker {
    status_code: i32,
    invocations: Arc<Mutex<Vec<(String, ProbeInvocation)>>>,
}

impl Default for RecordingInvoker {
    fn default() -> Self {
        RecordingInvoker::with_status(202)
    }
}

impl RecordingInvoker {
    pub fn with_status(status_code: i32) -> Self {
        RecordingInvoker {
            status_code,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invocations(&self) -> Vec<(String, ProbeInvocation)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeInvoker for RecordingInvoker {
    async fn invoke(&self, function_name: &str, payload: String) -> Result<i32, ProbeError> {
        let invocation: ProbeInvocation =
            serde_json::from_str(&payload).map_err(|err| ProbeError::InvocationFailed {
                function_name: function_name.to_string(),
                source: err.into(),
            })?;

        self.invocations
            .lock()
            .unwrap()
            .push((function_name.to_string(), invocation));

        Ok(self.status_code)
    }
}

/// Records callbacks, optionally failing every delivery after recording it.
#[derive(Clone, Default)]
pub struct RecordingCallback {
    fail: bool,
    responses: Arc<Mutex<Vec<(String, CallbackResponse)>>>,
}

impl RecordingCallback {
    pub fn failing() -> Self {
        RecordingCallback {
            fail: true,
            ..Default::default()
        }
    }

    pub fn responses(&self) -> Vec<(String, CallbackResponse)> {
        self.responses.lock().unwrap().clone()
    }

    /// The only response sent, panicking unless exactly one was.
    pub fn single_response(&self) -> CallbackResponse {
        let responses = self.responses();
        assert_eq!(1, responses.len(), "Expected exactly one callback: {responses:?}");

        responses[0].1.clone()
    }
}

#[async_trait]
impl CallbackSender for RecordingCallback {
    async fn send(
        &self,
        response_url: &str,
        response: &CallbackResponse,
    ) -> Result<(), CallbackError> {
        self.responses
            .lock()
            .unwrap()
            .push((response_url.to_string(), response.clone()));

        if self.fail {
            // Any serde error will do to simulate a failed delivery
            let err: serde_json::Error = serde_json::from_str::<Value>("").unwrap_err();
            return Err(CallbackError::Serialize(err));
        }

        Ok(())
    }
}

/// Creates the rule, then fails to bind its target.
#[derive(Clone, Default)]
pub struct TargetRejectingScheduler {
    pub inner: InMemoryScheduler,
}

#[async_trait]
impl ScheduleManager for TargetRejectingScheduler {
    async fn install(
        &self,
        rule_name: &str,
        period_minutes: u32,
        target: ScheduleTarget,
    ) -> Result<(), ScheduleError> {
        self.inner.install(rule_name, period_minutes, target).await?;

        Err(ScheduleError::new(
            rule_name,
            PutTargets,
            Rejected("target rejected".to_string()),
        ))
    }

    async fn remove(&self, rule_name: &str) -> Result<(), ScheduleError> {
        self.inner.remove(rule_name).await
    }

    async fn exists(&self, rule_name: &str) -> Result<bool, ScheduleError> {
        self.inner.exists(rule_name).await
    }
}

/// Answers every `exists` with an error, as a throttled lookup would.
#[derive(Clone, Default)]
pub struct LookupFailingScheduler {
    pub inner: InMemoryScheduler,
}

#[async_trait]
impl ScheduleManager for LookupFailingScheduler {
    async fn install(
        &self,
        rule_name: &str,
        period_minutes: u32,
        target: ScheduleTarget,
    ) -> Result<(), ScheduleError> {
        self.inner.install(rule_name, period_minutes, target).await
    }

    async fn remove(&self, rule_name: &str) -> Result<(), ScheduleError> {
        self.inner.remove(rule_name).await
    }

    async fn exists(&self, rule_name: &str) -> Result<bool, ScheduleError> {
        Err(ScheduleError::new(
            rule_name,
            DescribeRule,
            Rejected("rate exceeded".to_string()),
        ))
    }
}
