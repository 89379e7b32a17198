use async_trait::async_trait;
use chrono::TimeDelta;
use mailbox::MailboxErrorReason::{Malformed, NotFound};
use mailbox::{Mailbox, MailboxError, MailboxUrlIssuer};
use model::probe::{ProbeResult, UploadDescriptor};
use schedule::{ScheduleError, ScheduleManager, ScheduleTarget, TARGET_ID};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledSchedule {
    pub period_minutes: u32,
    // Target id and target, in bind order
    pub targets: Vec<(String, ScheduleTarget)>,
}

/// Schedule kept in a map; nothing ever fires.
#[derive(Clone, Default)]
pub struct InMemoryScheduler {
    schedules: Arc<Mutex<HashMap<String, InstalledSchedule>>>,
}

impl InMemoryScheduler {
    pub fn schedule(&self, rule_name: &str) -> Option<InstalledSchedule> {
        lock(&self.schedules).get(rule_name).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.schedules).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ScheduleManager for InMemoryScheduler {
    async fn install(
        &self,
        rule_name: &str,
        period_minutes: u32,
        target: ScheduleTarget,
    ) -> Result<(), ScheduleError> {
        let mut schedules = lock(&self.schedules);
        let schedule: &mut InstalledSchedule =
            schedules
                .entry(rule_name.to_string())
                .or_insert_with(|| InstalledSchedule {
                    period_minutes,
                    targets: Vec::new(),
                });

        schedule.period_minutes = period_minutes;
        schedule.targets.retain(|(id, _)| id != TARGET_ID);
        schedule.targets.push((TARGET_ID.to_string(), target));

        Ok(())
    }

    async fn remove(&self, rule_name: &str) -> Result<(), ScheduleError> {
        lock(&self.schedules).remove(rule_name);

        Ok(())
    }

    async fn exists(&self, rule_name: &str) -> Result<bool, ScheduleError> {
        Ok(lock(&self.schedules).contains_key(rule_name))
    }
}

/// Mailbox kept in a map of raw objects.
#[derive(Clone, Default)]
pub struct InMemoryMailbox {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    issued: Arc<Mutex<Vec<String>>>,
}

impl InMemoryMailbox {
    /// Write a probe result the way a probe would.
    pub fn put(&self, key: &str, result: &ProbeResult) -> Result<(), serde_json::Error> {
        self.put_raw(key, serde_json::to_vec(result)?);

        Ok(())
    }

    pub fn put_raw(&self, key: &str, body: Vec<u8>) {
        lock(&self.objects).insert(key.to_string(), body);
    }

    /// Keys upload descriptors were issued for, in issue order.
    pub fn issued_keys(&self) -> Vec<String> {
        lock(&self.issued).clone()
    }
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn read(&self, key: &str) -> Result<ProbeResult, MailboxError> {
        let body: Vec<u8> = lock(&self.objects)
            .get(key)
            .cloned()
            .ok_or_else(|| MailboxError::new(key, NotFound))?;

        serde_json::from_slice(&body).map_err(|err| MailboxError::new(key, Malformed(err.to_string())))
    }
}

#[async_trait]
impl MailboxUrlIssuer for InMemoryMailbox {
    async fn issue(
        &self,
        key: &str,
        _expires_in: TimeDelta,
    ) -> Result<UploadDescriptor, MailboxError> {
        lock(&self.issued).push(key.to_string());

        Ok(UploadDescriptor {
            url: "memory://mailbox/".to_string(),
            form_data: BTreeMap::from([("key".to_string(), key.to_string())]),
        })
    }
}
