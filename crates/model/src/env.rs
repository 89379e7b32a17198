/// ARN of the bucket used as the probe mailbox
pub const S3_BUCKET_ARN: &str = "S3_BUCKET_ARN";
/// Optional key prefix under which every wait keeps its mailbox slots
pub const S3_BUCKET_PREFIX: &str = "S3_BUCKET_PREFIX";
/// Lifetime of the upload descriptors handed to probes, in minutes
pub const MAILBOX_URL_EXPIRY_MINUTES: &str = "MAILBOX_URL_EXPIRY_MINUTES";
/// Set by the Lambda service, quoted in callback reasons
pub const LOG_STREAM_NAME: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
