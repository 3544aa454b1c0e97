use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use songbird::input::{HttpRequest, Input};
use std::time::Duration;
use tracing::{debug, info};

use super::{with_retries, AudioSource, SourceFactory, SourceRequest};
use crate::error::{PlayerError, PlayerResult};

/// Builds songbird HTTP inputs, probing the stream first so dead or
/// throttled links are retried before playback is attempted.
pub struct HttpSourceFactory {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpSourceFactory {
    pub fn new(timeout: Duration, retries: u32) -> PlayerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlayerError::SourceConstructionFailure(format!("http client: {e}")))?;

        Ok(Self::with_client(client, retries))
    }

    pub fn with_client(client: Client, retries: u32) -> Self {
        Self {
            client,
            retries,
            backoff: Duration::from_millis(500),
        }
    }

    async fn probe(&self, url: &str) -> Result<(), String> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::RANGE_NOT_SATISFIABLE {
            Ok(())
        } else {
            Err(format!("stream answered {status}"))
        }
    }
}

#[async_trait]
impl SourceFactory for HttpSourceFactory {
    async fn create(&self, request: SourceRequest) -> PlayerResult<AudioSource> {
        debug!("🔗 Probing stream: {}", request.stream_url);

        with_retries(self.retries, self.backoff, |_| self.probe(&request.stream_url)).await?;

        let input = Input::from(HttpRequest::new(self.client.clone(), request.stream_url.clone()));
        info!("✅ Audio source ready (volume {}%)", request.volume);
        Ok(AudioSource::new(&request, input))
    }
}
