use crate::aggregator::{MailboxAggregator, Terminal, TickOutcome};
use crate::cleanup;
use crate::config::WaiterConfig;
use crate::dispatcher::ProbeDispatcher;
use crate::error::WaiterError;
use callback::CallbackSender;
use chrono::{DateTime, Utc};
use lambda_runtime::tracing;
use lambda_runtime::tracing::Span;
use mailbox::{Mailbox, MailboxUrlIssuer};
use model::callback::CallbackStatus;
use model::request::{CustomResourceRequest, RequestType, WaitProperties};
use model::resource_name::{compose_resource_name, DEFAULT_MAX_LENGTH};
use model::wait::{SourceEvent, TickEvent, WaitState};
use model::{WaitStatus, WaiterEvent};
use probe::ProbeInvoker;
use schedule::{ScheduleManager, ScheduleTarget};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// What an invocation did, returned to the Lambda runtime for the logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Outcome", rename_all_fields = "PascalCase")]
pub enum HandlerOutcome {
    /// Probes started and the schedule installed, the callback comes later.
    Scheduled { rule_name: String },
    Waiting { rule_name: String },
    Completed { rule_name: String, status: WaitStatus },
    /// The request was answered straight away.
    Responded { status: CallbackStatus },
}

// How a request is answered when it doesn't fail
enum RequestAnswer {
    Scheduled(String),
    Respond(Map<String, Value>),
}

pub struct WaiterRuntime {
    config: WaiterConfig,
    scheduler: Arc<dyn ScheduleManager>,
    mailbox: Arc<dyn Mailbox>,
    issuer: Arc<dyn MailboxUrlIssuer>,
    invoker: Arc<dyn ProbeInvoker>,
    callback: Arc<dyn CallbackSender>,
}

impl WaiterRuntime {
    /// Create a new `WaiterRuntime` supplying all of its backends.
    pub fn new(
        config: WaiterConfig,
        scheduler: Arc<dyn ScheduleManager>,
        mailbox: Arc<dyn Mailbox>,
        issuer: Arc<dyn MailboxUrlIssuer>,
        invoker: Arc<dyn ProbeInvoker>,
        callback: Arc<dyn CallbackSender>,
    ) -> Self {
        WaiterRuntime {
            config,
            scheduler,
            mailbox,
            issuer,
            invoker,
            callback,
        }
    }

    /// Handle one event. Failures are answered through the callback, so this never errors.
    pub async fn accept(
        &self,
        event: WaiterEvent,
        function_arn: &str,
        now: DateTime<Utc>,
    ) -> HandlerOutcome {
        match event {
            WaiterEvent::Request(request) => self.accept_request(request, function_arn, now).await,
            WaiterEvent::Tick(tick) => self.accept_tick(tick, now).await,
        }
    }

    async fn accept_request(
        &self,
        request: CustomResourceRequest,
        function_arn: &str,
        now: DateTime<Utc>,
    ) -> HandlerOutcome {
        let source: SourceEvent = request.source_event();
        let rule_name: String = compose_resource_name(
            &source.stack_id,
            &source.logical_resource_id,
            DEFAULT_MAX_LENGTH,
        );
        Span::current().record("rule_name", rule_name.as_str());

        tracing::info!("Handling {:?} request", request.request_type);

        let answer: Result<RequestAnswer, WaiterError> = match request.request_type {
            RequestType::Create | RequestType::Update => {
                self.start(rule_name, source.clone(), function_arn, now).await
            }
            RequestType::Delete => self.stop(&rule_name).await,
        };

        let (status, message, data): (CallbackStatus, String, Map<String, Value>) = match answer {
            Ok(RequestAnswer::Scheduled(rule_name)) => {
                return HandlerOutcome::Scheduled { rule_name };
            }
            Ok(RequestAnswer::Respond(data)) => (CallbackStatus::Success, String::new(), data),
            Err(err) => {
                tracing::error!("Request failed: {err}");
                let message: String = err.to_string();
                let data: Map<String, Value> = cleanup::with_message(&message, Map::new());

                (CallbackStatus::Failed, message, data)
            }
        };

        let reason: String = cleanup::reason(&self.config.log_stream_name, status, &message);
        cleanup::respond(self.callback.as_ref(), &source, status, reason, data).await;

        HandlerOutcome::Responded { status }
    }

    /// Start the probes, then the schedule that will watch them.
    async fn start(
        &self,
        rule_name: String,
        source: SourceEvent,
        function_arn: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestAnswer, WaiterError> {
        let properties: WaitProperties = WaitProperties::from_value(&source.resource_properties)?;

        if properties.bypass() {
            tracing::info!(
                "SuccessCount is {}, answering without waiting",
                properties.success_count
            );
            return Ok(RequestAnswer::Respond(Map::new()));
        }

        let expire_time: DateTime<Utc> = properties.expire_time(now)?;
        let period_minutes: u32 = properties.pause_minutes()?;
        let wait: WaitState = WaitState {
            rule_name,
            source_event: source,
            expire_time,
            properties,
        };

        let target: ScheduleTarget = ScheduleTarget {
            arn: function_arn.to_string(),
            input: serde_json::to_string(&wait.to_tick())?,
        };

        self.dispatcher()
            .dispatch(&wait, &wait.probe_slots())
            .await?;

        if let Err(err) = self
            .scheduler
            .install(&wait.rule_name, period_minutes, target)
            .await
        {
            // The rule may exist without a target
            cleanup::remove_schedule(self.scheduler.as_ref(), &wait.rule_name).await;
            return Err(err.into());
        }

        tracing::info!("Waiting until {} for {} probe(s)", expire_time, wait.probes().len());

        Ok(RequestAnswer::Scheduled(wait.rule_name))
    }

    async fn stop(&self, rule_name: &str) -> Result<RequestAnswer, WaiterError> {
        if !self.scheduler.exists(rule_name).await? {
            tracing::info!("No schedule to delete");
            return Ok(RequestAnswer::Respond(Map::new()));
        }

        self.scheduler.remove(rule_name).await?;

        let message: String = format!("Deleted eventrule: {rule_name}");
        Ok(RequestAnswer::Respond(cleanup::with_message(&message, Map::new())))
    }

    async fn accept_tick(&self, tick: TickEvent, now: DateTime<Utc>) -> HandlerOutcome {
        let rule_name: String = tick.name.clone();
        let source: SourceEvent = tick.source_event.clone();
        Span::current().record("rule_name", rule_name.as_str());

        let outcome: Result<TickOutcome, WaiterError> = match WaitState::from_tick(tick) {
            Ok(wait) => self.aggregator().tick(&wait, now).await,
            Err(err) => Err(err.into()),
        };

        let terminal: Terminal = match outcome {
            Ok(TickOutcome::Continue) => return HandlerOutcome::Waiting { rule_name },
            Ok(TickOutcome::Terminal(terminal)) => terminal,
            Err(err) => {
                tracing::error!("Tick failed: {err}");
                Terminal::failed(err.to_string())
            }
        };

        self.finish(rule_name, &source, terminal).await
    }

    /// Answer the request, then stop the schedule. Removal happens even if the answer was lost.
    async fn finish(&self, rule_name: String, source: &SourceEvent, terminal: Terminal) -> HandlerOutcome {
        tracing::info!("Wait finished with {:?}: {}", terminal.status, terminal.message);

        let status: CallbackStatus = terminal.status.into();
        let reason: String = cleanup::reason(&self.config.log_stream_name, status, &terminal.message);
        let data: Map<String, Value> = cleanup::with_message(&terminal.message, terminal.data);

        cleanup::respond(self.callback.as_ref(), source, status, reason, data).await;
        cleanup::remove_schedule(self.scheduler.as_ref(), &rule_name).await;

        HandlerOutcome::Completed {
            rule_name,
            status: terminal.status,
        }
    }

    fn dispatcher(&self) -> ProbeDispatcher<'_> {
        ProbeDispatcher {
            issuer: self.issuer.as_ref(),
            invoker: self.invoker.as_ref(),
            bucket_prefix: &self.config.bucket_prefix,
            default_url_expiry: self.config.url_expiry,
        }
    }

    fn aggregator(&self) -> MailboxAggregator<'_> {
        MailboxAggregator {
            mailbox: self.mailbox.as_ref(),
            dispatcher: self.dispatcher(),
            bucket_prefix: &self.config.bucket_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{NOTHING_TO_PROBE, TIMED_OUT};
    use chrono::TimeDelta;
    use in_memory::{InMemoryMailbox, InMemoryScheduler, InstalledSchedule};
    use model::InvocationId;
    use model::callback::CallbackResponse;
    use model::probe::ProbeResult;
    use schedule::TARGET_ID;
    use serde_json::json;
    use test_utils::{
        custom_resource_request, lambda_probe, LookupFailingScheduler, RecordingCallback,
        RecordingInvoker, TargetRejectingScheduler, FUNCTION_ARN, LOGICAL_ID, REQUEST_ID, RESPONSE_URL, RULE_NAME,
    };

    #[derive(Default)]
    struct Harness {
        scheduler: InMemoryScheduler,
        mailbox: InMemoryMailbox,
        invoker: RecordingInvoker,
        callback: RecordingCallback,
    }

    impl Harness {
        fn runtime(&self) -> WaiterRuntime {
            self.runtime_with(Arc::new(self.scheduler.clone()))
        }

        fn runtime_with(&self, scheduler: Arc<dyn ScheduleManager>) -> WaiterRuntime {
            WaiterRuntime::new(
                WaiterConfig {
                    bucket_name: "mailbox".to_string(),
                    bucket_prefix: String::new(),
                    url_expiry: TimeDelta::minutes(120),
                    log_stream_name: "stream".to_string(),
                },
                scheduler,
                Arc::new(self.mailbox.clone()),
                Arc::new(self.mailbox.clone()),
                Arc::new(self.invoker.clone()),
                Arc::new(self.callback.clone()),
            )
        }

        fn installed(&self) -> InstalledSchedule {
            self.scheduler
                .schedule(RULE_NAME)
                .expect("Schedule should be installed")
        }

        /// The event the schedule would deliver next.
        fn next_tick(&self) -> WaiterEvent {
            let installed: InstalledSchedule = self.installed();
            let input: Value = serde_json::from_str(&installed.targets[0].1.input).unwrap();

            WaiterEvent::from_value(input).expect("Tick should parse")
        }
    }

    fn create(properties: Value) -> WaiterEvent {
        WaiterEvent::Request(custom_resource_request(RequestType::Create, properties))
    }

    fn message(response: &CallbackResponse) -> &str {
        response.data["Message"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_dispatches_probes_then_schedules_ticks() {
        let harness = Harness::default();
        let now: DateTime<Utc> = Utc::now();

        let outcome: HandlerOutcome = harness
            .runtime()
            .accept(
                create(json!({
                    "TimeoutInMinutes": "10",
                    "PauseTimeInMinutes": "3",
                    "Probes": [lambda_probe("first"), lambda_probe("second")]
                })),
                FUNCTION_ARN,
                now,
            )
            .await;

        assert_eq!(
            HandlerOutcome::Scheduled {
                rule_name: RULE_NAME.to_string()
            },
            outcome
        );
        assert_eq!(2, harness.invoker.invocations().len());
        assert!(harness.callback.responses().is_empty());

        let installed: InstalledSchedule = harness.installed();
        assert_eq!(3, installed.period_minutes);
        assert_eq!(1, installed.targets.len());
        assert_eq!(TARGET_ID, installed.targets[0].0);
        assert_eq!(FUNCTION_ARN, installed.targets[0].1.arn);

        let WaiterEvent::Tick(tick) = harness.next_tick() else {
            panic!("Schedule input should be a tick");
        };
        assert_eq!(RULE_NAME, tick.name);
        assert_eq!(REQUEST_ID, tick.source_event.request_id);
        assert_eq!(now + TimeDelta::minutes(10), tick.expire_time);
    }

    #[tokio::test]
    async fn update_replaces_the_schedule_target() {
        let harness = Harness::default();
        let runtime: WaiterRuntime = harness.runtime();
        let properties: Value = json!({ "TimeoutInMinutes": 5, "Probes": [lambda_probe("first")] });

        runtime.accept(create(properties.clone()), FUNCTION_ARN, Utc::now()).await;

        let mut update: CustomResourceRequest =
            custom_resource_request(RequestType::Update, properties);
        update.request_id = "update-request".to_string();
        runtime
            .accept(WaiterEvent::Request(update), FUNCTION_ARN, Utc::now())
            .await;

        assert_eq!(1, harness.scheduler.len());
        assert_eq!(1, harness.installed().targets.len());
        assert_eq!("update-request", harness.next_tick().invocation_id());
    }

    #[tokio::test]
    async fn zero_success_count_answers_without_waiting() {
        let harness = Harness::default();

        let outcome: HandlerOutcome = harness
            .runtime()
            .accept(
                create(json!({ "SuccessCount": "0", "Probes": [lambda_probe("first")] })),
                FUNCTION_ARN,
                Utc::now(),
            )
            .await;

        assert_eq!(
            HandlerOutcome::Responded {
                status: CallbackStatus::Success
            },
            outcome
        );

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Success, response.status);
        assert_eq!(LOGICAL_ID, response.physical_resource_id);
        assert_eq!("See the details in CloudWatch Log Stream: stream", response.reason);
        assert_eq!(RESPONSE_URL, harness.callback.responses()[0].0);
        assert!(harness.scheduler.is_empty());
        assert!(harness.invoker.invocations().is_empty());
    }

    #[tokio::test]
    async fn rejected_dispatch_fails_without_a_schedule() {
        let harness = Harness {
            invoker: RecordingInvoker::with_status(500),
            ..Default::default()
        };

        let outcome: HandlerOutcome = harness
            .runtime()
            .accept(
                create(json!({ "TimeoutInMinutes": 5, "Probes": [lambda_probe("first")] })),
                FUNCTION_ARN,
                Utc::now(),
            )
            .await;

        assert_eq!(
            HandlerOutcome::Responded {
                status: CallbackStatus::Failed
            },
            outcome
        );

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Failed, response.status);
        assert!(message(&response).contains("status code 500"));
        assert!(response.reason.starts_with(message(&response)));
        assert!(harness.scheduler.is_empty());
    }

    #[tokio::test]
    async fn failed_install_removes_the_partial_rule() {
        let harness = Harness::default();
        let scheduler = TargetRejectingScheduler::default();

        harness
            .runtime_with(Arc::new(scheduler.clone()))
            .accept(
                create(json!({ "TimeoutInMinutes": 5, "Probes": [lambda_probe("first")] })),
                FUNCTION_ARN,
                Utc::now(),
            )
            .await;

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Failed, response.status);
        assert!(message(&response).contains("target rejected"));
        assert!(scheduler.inner.is_empty());
    }

    #[tokio::test]
    async fn missing_timeout_fails_the_request() {
        let harness = Harness::default();

        harness
            .runtime()
            .accept(create(json!({ "Probes": [] })), FUNCTION_ARN, Utc::now())
            .await;

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Failed, response.status);
        assert!(message(&response).contains("TimeoutInMinutes"));
        assert!(harness.scheduler.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_schedule() {
        let harness = Harness::default();
        let runtime: WaiterRuntime = harness.runtime();

        runtime
            .accept(create(json!({ "TimeoutInMinutes": 5 })), FUNCTION_ARN, Utc::now())
            .await;
        runtime
            .accept(
                WaiterEvent::Request(custom_resource_request(RequestType::Delete, json!({}))),
                FUNCTION_ARN,
                Utc::now(),
            )
            .await;

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Success, response.status);
        assert_eq!("Deleted eventrule: demo-Waiter", message(&response));
        assert!(harness.scheduler.is_empty());
    }

    #[tokio::test]
    async fn delete_without_schedule_succeeds_with_no_data() {
        let harness = Harness::default();

        harness
            .runtime()
            .accept(
                WaiterEvent::Request(custom_resource_request(RequestType::Delete, Value::Null)),
                FUNCTION_ARN,
                Utc::now(),
            )
            .await;

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Success, response.status);
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn unreported_probe_times_out_and_stops_ticking() {
        let harness = Harness::default();
        let runtime: WaiterRuntime = harness.runtime();
        let now: DateTime<Utc> = Utc::now();

        runtime
            .accept(
                create(json!({ "TimeoutInMinutes": 2, "Probes": [lambda_probe("silent")] })),
                FUNCTION_ARN,
                now,
            )
            .await;

        let waiting: HandlerOutcome = runtime
            .accept(harness.next_tick(), FUNCTION_ARN, now + TimeDelta::minutes(1))
            .await;
        assert_eq!(
            HandlerOutcome::Waiting {
                rule_name: RULE_NAME.to_string()
            },
            waiting
        );
        // Re-dispatched to the same slot with a fresh credential
        assert_eq!(2, harness.invoker.invocations().len());
        assert_eq!(2, harness.mailbox.issued_keys().len());
        assert_eq!(harness.mailbox.issued_keys()[0], harness.mailbox.issued_keys()[1]);

        let completed: HandlerOutcome = runtime
            .accept(harness.next_tick(), FUNCTION_ARN, now + TimeDelta::minutes(3))
            .await;
        assert_eq!(
            HandlerOutcome::Completed {
                rule_name: RULE_NAME.to_string(),
                status: WaitStatus::Timeout
            },
            completed
        );

        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Failed, response.status);
        assert_eq!(json!({ "Message": TIMED_OUT }), Value::Object(response.data.clone()));
        assert_eq!("TIMEOUT. See the details in CloudWatch Log Stream: stream", response.reason);
        assert!(!harness.scheduler.exists(RULE_NAME).await.unwrap());
    }

    #[tokio::test]
    async fn nothing_to_probe_completes_once_expired() {
        let harness = Harness::default();
        let runtime: WaiterRuntime = harness.runtime();
        let now: DateTime<Utc> = Utc::now();

        runtime
            .accept(create(json!({ "TimeoutInMinutes": 0 })), FUNCTION_ARN, now)
            .await;
        let outcome: HandlerOutcome = runtime
            .accept(harness.next_tick(), FUNCTION_ARN, now + TimeDelta::seconds(61))
            .await;

        assert!(matches!(
            outcome,
            HandlerOutcome::Completed {
                status: WaitStatus::Success,
                ..
            }
        ));
        let response: CallbackResponse = harness.callback.single_response();
        assert_eq!(CallbackStatus::Success, response.status);
        assert_eq!(NOTHING_TO_PROBE, message(&response));
        assert!(!harness.scheduler.exists(RULE_NAME).await.unwrap());
    }

    #[tokio::test]
    async fn lost_callback_still_removes_the_schedule() {
        let harness = Harness {
            callback: RecordingCallback::failing(),
            ..Default::default()
        };
        let runtime: WaiterRuntime = harness.runtime();
        let now: DateTime<Utc> = Utc::now();

        runtime
            .accept(
                create(json!({ "TimeoutInMinutes": 5, "Probes": [lambda_probe("first")] })),
                FUNCTION_ARN,
                now,
            )
            .await;
        harness
            .mailbox
            .put(
                &format!("{RULE_NAME}/lambda-probe-0"),
                &ProbeResult::new("FAILED", REQUEST_ID, None),
            )
            .unwrap();

        let outcome: HandlerOutcome = runtime.accept(harness.next_tick(), FUNCTION_ARN, now).await;

        assert!(matches!(
            outcome,
            HandlerOutcome::Completed {
                status: WaitStatus::Failed,
                ..
            }
        ));
        assert_eq!(1, harness.callback.responses().len());
        assert!(harness.scheduler.is_empty());
    }

    #[tokio::test]
    async fn broken_tick_fails_the_wait_and_cleans_up() {
        let harness = Harness::default();
        let runtime: WaiterRuntime = harness.runtime();

        runtime
            .accept(create(json!({ "TimeoutInMinutes": 5 })), FUNCTION_ARN, Utc::now())
            .await;

        let WaiterEvent::Tick(mut tick) = harness.next_tick() else {
            panic!("Schedule input should be a tick");
        };
        tick.source_event.resource_properties = json!({ "PauseTimeInMinutes": "often" });

        let outcome: HandlerOutcome = runtime
            .accept(WaiterEvent::Tick(tick), FUNCTION_ARN, Utc::now())
            .await;

        assert!(matches!(
            outcome,
            HandlerOutcome::Completed {
                status: WaitStatus::Failed,
                ..
            }
        ));
        assert_eq!(CallbackStatus::Failed, harness.callback.single_response().status);
        assert!(harness.scheduler.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_numbers_fail_the_request() {
        let cases: [(&str, Value); 4] = [
            ("TimeoutInMinutes", json!({ "TimeoutInMinutes": "99999999999999" })),
            ("TimeoutInMinutes", json!({ "TimeoutInMinutes": "9223372036854775807" })),
            (
                "PauseTimeInMinutes",
                json!({ "TimeoutInMinutes": 5, "PauseTimeInMinutes": "4294967296" }),
            ),
            (
                "UrlExpiryInMinutes",
                json!({ "TimeoutInMinutes": 5, "UrlExpiryInMinutes": "9223372036854775807" }),
            ),
        ];

        for (property, mut properties) in cases {
            properties["Probes"] = json!([lambda_probe("first")]);
            let harness = Harness::default();

            let outcome: HandlerOutcome = harness
                .runtime()
                .accept(create(properties), FUNCTION_ARN, Utc::now())
                .await;

            assert_eq!(
                HandlerOutcome::Responded {
                    status: CallbackStatus::Failed
                },
                outcome,
                "{property}"
            );
            let response: CallbackResponse = harness.callback.single_response();
            assert!(message(&response).contains(property), "{}", message(&response));
            assert!(harness.scheduler.is_empty());
            assert!(harness.invoker.invocations().is_empty());
        }
    }

    #[tokio::test]
    async fn failed_schedule_lookup_still_stops_ticking() {
        let harness = Harness::default();
        let scheduler = LookupFailingScheduler::default();
        let runtime: WaiterRuntime = harness.runtime_with(Arc::new(scheduler.clone()));
        let now: DateTime<Utc> = Utc::now();

        runtime
            .accept(create(json!({ "TimeoutInMinutes": 0 })), FUNCTION_ARN, now)
            .await;
        let installed: InstalledSchedule = scheduler
            .inner
            .schedule(RULE_NAME)
            .expect("Schedule should be installed");
        let tick: Value = serde_json::from_str(&installed.targets[0].1.input).unwrap();

        let outcome: HandlerOutcome = runtime
            .accept(
                WaiterEvent::from_value(tick).unwrap(),
                FUNCTION_ARN,
                now + TimeDelta::minutes(1),
            )
            .await;

        assert!(matches!(
            outcome,
            HandlerOutcome::Completed {
                status: WaitStatus::Success,
                ..
            }
        ));
        assert_eq!(1, harness.callback.responses().len());
        assert!(scheduler.inner.is_empty());
    }

    #[test]
    fn outcome_serializes_with_a_tag() {
        let outcome = HandlerOutcome::Completed {
            rule_name: RULE_NAME.to_string(),
            status: WaitStatus::Timeout,
        };

        assert_eq!(
            json!({ "Outcome": "Completed", "RuleName": "demo-Waiter", "Status": "TIMEOUT" }),
            serde_json::to_value(outcome).unwrap()
        );
    }
}
