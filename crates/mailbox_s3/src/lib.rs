use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::operation::get_bucket_location::GetBucketLocationOutput;
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use chrono::{TimeDelta, Utc};
use lambda_runtime::tracing;
use mailbox::MailboxErrorReason::{BackendFailure, Malformed, NotFound};
use mailbox::{Mailbox, MailboxError, MailboxUrlIssuer};
use model::probe::{ProbeResult, UploadDescriptor};
use tokio::sync::OnceCell;

pub mod presign;

// Buckets in us-east-1 report no location constraint
const DEFAULT_REGION: &str = "us-east-1";
// Legacy constraint still returned for old eu-west-1 buckets
const LEGACY_EU: &str = "EU";

/// Mailbox stored in a single shared S3 bucket.
pub struct S3Mailbox {
    s3_client: aws_sdk_s3::Client,
    credentials: SharedCredentialsProvider,
    bucket_name: String,
    region: OnceCell<String>,
}

impl S3Mailbox {
    pub fn new(
        s3_client: aws_sdk_s3::Client,
        credentials: SharedCredentialsProvider,
        bucket_name: String,
    ) -> Self {
        S3Mailbox {
            s3_client,
            credentials,
            bucket_name,
            region: OnceCell::new(),
        }
    }

    /// Bucket region, looked up once per process.
    async fn region(&self) -> Result<&str, MailboxError> {
        let region: &String = self
            .region
            .get_or_try_init(|| async {
                let output: GetBucketLocationOutput = self
                    .s3_client
                    .get_bucket_location()
                    .bucket(&self.bucket_name)
                    .send()
                    .await
                    .map_err(|err| MailboxError::new(&self.bucket_name, BackendFailure(err.into())))?;

                let region: String = match output.location_constraint().map(|c| c.as_str()) {
                    None | Some("") => DEFAULT_REGION.to_string(),
                    Some(LEGACY_EU) => "eu-west-1".to_string(),
                    Some(region) => region.to_string(),
                };

                tracing::debug!(bucket = %self.bucket_name, region = %region, "Resolved mailbox region");

                Ok::<String, MailboxError>(region)
            })
            .await?;

        Ok(region.as_str())
    }
}

#[async_trait]
impl Mailbox for S3Mailbox {
    async fn read(&self, key: &str) -> Result<ProbeResult, MailboxError> {
        let output: GetObjectOutput = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
                    MailboxError::new(key, NotFound)
                } else {
                    MailboxError::new(key, BackendFailure(err.into()))
                }
            })?;

        let body: Vec<u8> = output
            .body
            .collect()
            .await
            .map_err(|err| MailboxError::new(key, BackendFailure(err.into())))?
            .into_bytes()
            .to_vec();

        serde_json::from_slice(&body).map_err(|err| MailboxError::new(key, Malformed(err.to_string())))
    }
}

#[async_trait]
impl MailboxUrlIssuer for S3Mailbox {
    async fn issue(
        &self,
        key: &str,
        expires_in: TimeDelta,
    ) -> Result<UploadDescriptor, MailboxError> {
        let region: &str = self.region().await?;

        let credentials: Credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|err| MailboxError::new(key, BackendFailure(err.into())))?;

        presign::presigned_post(
            &self.bucket_name,
            key,
            region,
            &credentials,
            Utc::now(),
            expires_in,
        )
    }
}
