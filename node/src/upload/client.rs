// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::UploadConfig;
use crate::upload::status::UploadResponse;
use pulse_kernel::{EventCategory, PayloadFormat};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;

/// One POST to the collector.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub category: EventCategory,
    pub format: PayloadFormat,
    pub body: Vec<u8>,
    pub event_count: usize,
    /// Milliseconds since the epoch at send time, passed as `batch_time`.
    pub batch_time: u64,
}

/// Delivers one batch. Implementations never panic and never error: every
/// failure is folded into an `UploadResponse`.
pub trait Uploader: Send + Sync + 'static {
    fn upload(&self, request: UploadRequest) -> impl Future<Output = UploadResponse> + Send;
}

impl<U: Uploader> Uploader for Arc<U> {
    fn upload(&self, request: UploadRequest) -> impl Future<Output = UploadResponse> + Send {
        (**self).upload(request)
    }
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    config: Arc<UploadConfig>,
}

impl HttpUploader {
    pub fn new(config: UploadConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// `{endpoint}/{client_token}?batch_time={ms}`
    pub fn request_url(&self, category: EventCategory, batch_time: u64) -> String {
        let endpoint = self.config.endpoints.for_category(category).trim_end_matches('/');
        format!("{}/{}?batch_time={}", endpoint, self.config.client_token, batch_time)
    }
}

impl Uploader for HttpUploader {
    async fn upload(&self, request: UploadRequest) -> UploadResponse {
        let url = self.request_url(request.category, request.batch_time);
        let result = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, request.format.content_type())
            .body(request.body)
            .send()
            .await;

        match result {
            Ok(resp) => UploadResponse::Status(resp.status().as_u16()),
            Err(e) if e.is_timeout() => UploadResponse::Transport(format!("request timed out: {}", e)),
            Err(e) => UploadResponse::Transport(e.to_string()),
        }
    }
}
