//! Browser style pre-signed POST uploads.
//!
//! The S3 SDK only presigns single requests, which would hand probes a URL
//! for one fixed verb. A POST policy lets an unauthenticated client upload a
//! form to exactly one key until the policy expires, and nothing else.

use aws_credential_types::Credentials;
use aws_sigv4::sign::v4::{calculate_signature, generate_signing_key};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use mailbox::MailboxError;
use mailbox::MailboxErrorReason::ExpiryOutOfRange;
use model::probe::UploadDescriptor;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::SystemTime;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Regional virtual hosted endpoint. The global form answers uploads with a
/// 307 redirect until the bucket's DNS has propagated.
pub fn regional_url(bucket: &str, region: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/")
}

pub fn presigned_post(
    bucket: &str,
    key: &str,
    region: &str,
    credentials: &Credentials,
    now: DateTime<Utc>,
    expires_in: TimeDelta,
) -> Result<UploadDescriptor, MailboxError> {
    let expiration: DateTime<Utc> = now
        .checked_add_signed(expires_in)
        .ok_or_else(|| MailboxError::new(key, ExpiryOutOfRange(expires_in)))?;

    let amz_date: String = now.format("%Y%m%dT%H%M%SZ").to_string();
    let credential: String = format!(
        "{}/{}/{region}/{SERVICE}/aws4_request",
        credentials.access_key_id(),
        now.format("%Y%m%d")
    );

    let mut fields: BTreeMap<String, String> = BTreeMap::from([
        ("key".to_string(), key.to_string()),
        ("x-amz-algorithm".to_string(), ALGORITHM.to_string()),
        ("x-amz-credential".to_string(), credential),
        ("x-amz-date".to_string(), amz_date),
    ]);
    if let Some(token) = credentials.session_token() {
        fields.insert("x-amz-security-token".to_string(), token.to_string());
    }

    // Every form field except the policy and signature must appear as a condition
    let mut conditions: Vec<Value> = vec![json!({ "bucket": bucket })];
    conditions.extend(fields.iter().map(|(name, value)| {
        let mut condition: Map<String, Value> = Map::new();
        condition.insert(name.clone(), Value::String(value.clone()));
        Value::Object(condition)
    }));

    let policy: Value = json!({
        "expiration": expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "conditions": conditions,
    });
    let encoded_policy: String = STANDARD.encode(policy.to_string());

    let signing_key = generate_signing_key(
        credentials.secret_access_key(),
        SystemTime::from(now),
        region,
        SERVICE,
    );
    let signature: String = calculate_signature(signing_key, encoded_policy.as_bytes());

    fields.insert("policy".to_string(), encoded_policy);
    fields.insert("x-amz-signature".to_string(), signature);

    Ok(UploadDescriptor {
        url: regional_url(bucket, region),
        form_data: fields,
    })
}
