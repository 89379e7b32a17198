use async_trait::async_trait;
use aws_sdk_eventbridge::operation::delete_rule::DeleteRuleError;
use aws_sdk_eventbridge::operation::describe_rule::DescribeRuleError;
use aws_sdk_eventbridge::operation::list_targets_by_rule::{
    ListTargetsByRuleError, ListTargetsByRuleOutput,
};
use aws_sdk_eventbridge::operation::put_targets::PutTargetsOutput;
use aws_sdk_eventbridge::operation::remove_targets::RemoveTargetsOutput;
use aws_sdk_eventbridge::types::{PutTargetsResultEntry, RemoveTargetsResultEntry, RuleState, Target};
use lambda_runtime::tracing;
use schedule::ScheduleErrorReason::Rejected;
use schedule::ScheduleOperation::{
    DeleteRule, DescribeRule, ListTargets, PutRule, PutTargets, RemoveTargets,
};
use schedule::{
    rate_expression, ScheduleError, ScheduleManager, ScheduleTarget, TARGET_ID,
};

const RULE_DESCRIPTION: &str = "Re-invokes the probe waiter until its wait completes";

/// Schedule backed by a rate based EventBridge rule with a single target.
pub struct EventBridgeScheduler {
    eventbridge_client: aws_sdk_eventbridge::Client,
}

impl EventBridgeScheduler {
    pub fn new(eventbridge_client: aws_sdk_eventbridge::Client) -> Self {
        EventBridgeScheduler { eventbridge_client }
    }
}

#[async_trait]
impl ScheduleManager for EventBridgeScheduler {
    async fn install(
        &self,
        rule_name: &str,
        period_minutes: u32,
        target: ScheduleTarget,
    ) -> Result<(), ScheduleError> {
        self.eventbridge_client
            .put_rule()
            .name(rule_name)
            .schedule_expression(rate_expression(period_minutes))
            .state(RuleState::Enabled)
            .description(RULE_DESCRIPTION)
            .send()
            .await
            .map_err(|err| ScheduleError::backend(rule_name, PutRule, err))?;

        // A fixed id makes put_targets replace rather than append
        let target: Target = Target::builder()
            .id(TARGET_ID)
            .arn(target.arn)
            .input(target.input)
            .build()
            .map_err(|err| ScheduleError::new(rule_name, PutTargets, Rejected(err.to_string())))?;

        let output: PutTargetsOutput = self
            .eventbridge_client
            .put_targets()
            .rule(rule_name)
            .targets(target)
            .send()
            .await
            .map_err(|err| ScheduleError::backend(rule_name, PutTargets, err))?;

        if output.failed_entry_count() > 0 {
            let reasons: Vec<String> = output
                .failed_entries()
                .iter()
                .map(|entry: &PutTargetsResultEntry| {
                    describe_failure(entry.target_id(), entry.error_message())
                })
                .collect();

            return Err(ScheduleError::new(
                rule_name,
                PutTargets,
                Rejected(reasons.join(", ")),
            ));
        }

        tracing::info!(rule_name, period_minutes, "Installed schedule");

        Ok(())
    }

    async fn remove(&self, rule_name: &str) -> Result<(), ScheduleError> {
        let listed: ListTargetsByRuleOutput = match self
            .eventbridge_client
            .list_targets_by_rule()
            .rule(rule_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(ListTargetsByRuleError::is_resource_not_found_exception) =>
            {
                tracing::debug!(rule_name, "Schedule already removed");

                return Ok(());
            }
            Err(err) => return Err(ScheduleError::backend(rule_name, ListTargets, err)),
        };

        let target_ids: Vec<String> = listed
            .targets()
            .iter()
            .map(|target: &Target| target.id().to_string())
            .collect();

        if !target_ids.is_empty() {
            let output: RemoveTargetsOutput = self
                .eventbridge_client
                .remove_targets()
                .rule(rule_name)
                .set_ids(Some(target_ids))
                .send()
                .await
                .map_err(|err| ScheduleError::backend(rule_name, RemoveTargets, err))?;

            if output.failed_entry_count() > 0 {
                let reasons: Vec<String> = output
                    .failed_entries()
                    .iter()
                    .map(|entry: &RemoveTargetsResultEntry| {
                        describe_failure(entry.target_id(), entry.error_message())
                    })
                    .collect();

                return Err(ScheduleError::new(
                    rule_name,
                    RemoveTargets,
                    Rejected(reasons.join(", ")),
                ));
            }
        }

        match self
            .eventbridge_client
            .delete_rule()
            .name(rule_name)
            .send()
            .await
        {
            Ok(_) => {}
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(DeleteRuleError::is_resource_not_found_exception) => {}
            Err(err) => return Err(ScheduleError::backend(rule_name, DeleteRule, err)),
        }

        tracing::info!(rule_name, "Removed schedule");

        Ok(())
    }

    async fn exists(&self, rule_name: &str) -> Result<bool, ScheduleError> {
        match self
            .eventbridge_client
            .describe_rule()
            .name(rule_name)
            .send()
            .await
        {
            Ok(output) => Ok(output.name() == Some(rule_name)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(DescribeRuleError::is_resource_not_found_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(ScheduleError::backend(rule_name, DescribeRule, err)),
        }
    }
}

fn describe_failure(target_id: Option<&str>, message: Option<&str>) -> String {
    format!(
        "target {} failed: {}",
        target_id.unwrap_or("unknown"),
        message.unwrap_or("no reason given")
    )
}
