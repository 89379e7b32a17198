use async_trait::async_trait;
use lambda_runtime::tracing;
use model::callback::CallbackResponse;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Bound on a single callback request.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers the single terminal response of a wait.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn send(&self, response_url: &str, response: &CallbackResponse)
    -> Result<(), CallbackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("failed to serialize callback body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("callback request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// PUTs the response to the pre-signed response URL.
pub struct HttpCallbackSender {
    client: reqwest::Client,
}

impl HttpCallbackSender {
    pub fn new(timeout: Duration) -> Result<Self, CallbackError> {
        let client: reqwest::Client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(HttpCallbackSender { client })
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn send(
        &self,
        response_url: &str,
        response: &CallbackResponse,
    ) -> Result<(), CallbackError> {
        let body: String = serde_json::to_string(response)?;

        // The URL is signed for an empty content type
        let status = self
            .client
            .put(response_url)
            .header(CONTENT_TYPE, "")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .status();

        tracing::info!(status = status.as_u16(), "Sent callback {:?}", response.status);

        Ok(())
    }
}
