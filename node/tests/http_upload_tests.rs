// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use common::{start_collector, Collector};
use pulse_kernel::{EventCategory, PayloadFormat};
use pulse_node::config::{Endpoints, UploadConfig};
use pulse_node::upload::{HttpUploader, UploadRequest, UploadResponse, UploadStatus, Uploader};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn uploader_for(addr: SocketAddr, timeout: Duration) -> HttpUploader {
    HttpUploader::new(UploadConfig {
        endpoints: Endpoints::with_base(&format!("http://{}", addr)),
        client_token: "client-token".into(),
        request_timeout: timeout,
        user_agent: "pulse-tests/1.0".into(),
        ..Default::default()
    })
    .unwrap()
}

fn request(category: EventCategory, body: &[u8]) -> UploadRequest {
    UploadRequest {
        category,
        format: category.payload_format(),
        body: body.to_vec(),
        event_count: 1,
        batch_time: 1_234,
    }
}

#[tokio::test]
async fn test_request_shape_for_json_array() {
    let collector = Collector::default();
    let addr = start_collector(collector.clone()).await;
    let uploader = uploader_for(addr, Duration::from_secs(5));

    let response = uploader.upload(request(EventCategory::Rum, b"[{\"a\":1}]")).await;
    assert_eq!(response, UploadResponse::Status(202));
    assert_eq!(UploadStatus::classify(&response), UploadStatus::Delivered);

    let received = collector.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].category, "rum");
    assert_eq!(received[0].token, "client-token");
    assert_eq!(received[0].query.as_deref(), Some("batch_time=1234"));
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(received[0].user_agent.as_deref(), Some("pulse-tests/1.0"));
    assert_eq!(received[0].body, b"[{\"a\":1}]".to_vec());
}

#[tokio::test]
async fn test_traces_are_sent_as_plain_text() {
    let collector = Collector::default();
    let addr = start_collector(collector.clone()).await;
    let uploader = uploader_for(addr, Duration::from_secs(5));

    uploader.upload(request(EventCategory::Traces, b"{}\n{}")).await;

    let received = collector.received.lock().unwrap().clone();
    assert_eq!(received[0].category, "traces");
    assert_eq!(
        received[0].content_type.as_deref(),
        Some(PayloadFormat::NdJson.content_type())
    );
}

#[tokio::test]
async fn test_status_codes_pass_through() {
    let collector = Collector {
        statuses: Arc::new(Mutex::new(VecDeque::from(vec![503, 429, 400]))),
        ..Default::default()
    };
    let addr = start_collector(collector).await;
    let uploader = uploader_for(addr, Duration::from_secs(5));

    for expected in [503, 429, 400] {
        let response = uploader.upload(request(EventCategory::Logs, b"[]")).await;
        assert_eq!(response, UploadResponse::Status(expected));
    }
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let collector = Collector {
        delay: Some(Duration::from_secs(2)),
        ..Default::default()
    };
    let addr = start_collector(collector).await;
    let uploader = uploader_for(addr, Duration::from_millis(200));

    let response = uploader.upload(request(EventCategory::Logs, b"[]")).await;
    assert!(matches!(response, UploadResponse::Transport(_)));
    assert_eq!(UploadStatus::classify(&response), UploadStatus::Retryable);
}

#[tokio::test]
async fn test_unreachable_collector_is_retryable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let uploader = uploader_for(addr, Duration::from_secs(2));
    let response = uploader.upload(request(EventCategory::Logs, b"[]")).await;
    assert_eq!(UploadStatus::classify(&response), UploadStatus::Retryable);
}
