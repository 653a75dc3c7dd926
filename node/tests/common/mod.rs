// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use pulse_kernel::model::{LogEvent, LogStatus};
use pulse_kernel::{Event, EventCategory};
use pulse_node::config::QueueConfig;
use pulse_node::diagnostics::MemorySink;
use pulse_node::storage::PersistentQueue;
use pulse_node::upload::{UploadRequest, UploadResponse, Uploader};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replies from a script, then 200 forever. Records every request.
#[derive(Clone, Default)]
pub struct ScriptedUploader {
    responses: Arc<Mutex<VecDeque<UploadResponse>>>,
    requests: Arc<Mutex<Vec<UploadRequest>>>,
}

impl ScriptedUploader {
    pub fn new(responses: impl IntoIterator<Item = UploadResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Uploader for ScriptedUploader {
    async fn upload(&self, request: UploadRequest) -> UploadResponse {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(UploadResponse::Status(200))
    }
}

pub fn log_event(i: u64) -> Event {
    LogEvent::new(i, LogStatus::Info, format!("event number {}", i), "demo-app", "main")
        .with_attribute("index", i)
        .into()
}

pub fn logs_queue(dir: &Path, config: QueueConfig) -> (Arc<PersistentQueue>, Arc<MemorySink>) {
    let sink = MemorySink::new();
    let queue = PersistentQueue::open(dir, EventCategory::Logs, config, sink.clone()).unwrap();
    (Arc::new(queue), sink)
}

#[derive(Debug, Clone)]
pub struct Received {
    pub category: String,
    pub token: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct Collector {
    pub received: Arc<Mutex<Vec<Received>>>,
    pub statuses: Arc<Mutex<VecDeque<u16>>>,
    pub delay: Option<Duration>,
}

async fn intake(
    State(collector): State<Collector>,
    UrlPath((category, token)): UrlPath<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(delay) = collector.delay {
        tokio::time::sleep(delay).await;
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    collector.received.lock().unwrap().push(Received {
        category,
        token,
        query,
        content_type: header("content-type"),
        user_agent: header("user-agent"),
        body: body.to_vec(),
    });
    let status = collector.statuses.lock().unwrap().pop_front().unwrap_or(202);
    StatusCode::from_u16(status).unwrap()
}

/// Mock intake on an ephemeral port. Replies 202 unless scripted otherwise.
pub async fn start_collector(collector: Collector) -> SocketAddr {
    let app = Router::new()
        .route("/v1/input/:category/:token", post(intake))
        .with_state(collector);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
