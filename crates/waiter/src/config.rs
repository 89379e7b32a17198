use chrono::TimeDelta;
use model::ConfigError;
use model::env::{LOG_STREAM_NAME, MAILBOX_URL_EXPIRY_MINUTES, S3_BUCKET_ARN, S3_BUCKET_PREFIX};
use model::request::url_expiry_minutes;

pub const DEFAULT_URL_EXPIRY_MINUTES: i64 = 120;

/// Process wide settings, read once at cold start.
#[derive(Debug, Clone, PartialEq)]
pub struct WaiterConfig {
    pub bucket_name: String,
    pub bucket_prefix: String,
    /// Lifetime of upload credentials when a request doesn't set its own.
    pub url_expiry: TimeDelta,
    pub log_stream_name: String,
}

impl WaiterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        WaiterConfig::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bucket_arn: String =
            lookup(S3_BUCKET_ARN).ok_or(ConfigError::MissingVariable(S3_BUCKET_ARN))?;
        let bucket_name: String = bucket_name_from_arn(&bucket_arn);
        if bucket_name.is_empty() {
            return Err(ConfigError::InvalidProperty {
                property: S3_BUCKET_ARN,
                reason: format!("no bucket name in {bucket_arn}"),
            });
        }

        let url_expiry: TimeDelta = match lookup(MAILBOX_URL_EXPIRY_MINUTES) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|err| err.to_string())
                .and_then(url_expiry_minutes)
                .map_err(|reason| ConfigError::InvalidProperty {
                    property: MAILBOX_URL_EXPIRY_MINUTES,
                    reason: format!("{raw:?}: {reason}"),
                })?,
            None => TimeDelta::minutes(DEFAULT_URL_EXPIRY_MINUTES),
        };

        Ok(WaiterConfig {
            bucket_name,
            bucket_prefix: lookup(S3_BUCKET_PREFIX).unwrap_or_default(),
            url_expiry,
            log_stream_name: lookup(LOG_STREAM_NAME).unwrap_or_default(),
        })
    }
}

/// `arn:aws:s3:::my-bucket` names `my-bucket`, a bare name is taken as is.
pub fn bucket_name_from_arn(arn: &str) -> String {
    arn.rsplit(':').next().unwrap_or_default().to_string()
}
