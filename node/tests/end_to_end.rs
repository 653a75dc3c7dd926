// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use common::{log_event, logs_queue, start_collector, Collector};
use pulse_kernel::correlation::link_logs;
use pulse_kernel::model::*;
use pulse_kernel::payload::{self, PayloadFormat};
use pulse_kernel::session::reconstruct;
use pulse_kernel::types::{SpanId, TraceId};
use pulse_kernel::{Event, EventCategory};
use pulse_node::config::{DelayConfig, Endpoints, NodeConfig, QueueConfig, RetryPolicy, UploadConfig};
use pulse_node::diagnostics::MemorySink;
use pulse_node::upload::{HttpUploader, TickOutcome, UploadResponse, UploadWorker};
use pulse_node::Pipeline;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

fn fast_delay() -> DelayConfig {
    DelayConfig {
        initial: Duration::from_millis(50),
        min: Duration::from_millis(10),
        max: Duration::from_millis(500),
        decrease_factor: 0.9,
        backoff_multiplier: 2.0,
    }
}

fn upload_config(addr: SocketAddr) -> UploadConfig {
    UploadConfig {
        endpoints: Endpoints::with_base(&format!("http://{}", addr)),
        client_token: "e2e".into(),
        request_timeout: Duration::from_secs(5),
        delay: fast_delay(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rotation_retry_and_delivery() {
    let dir = tempdir().unwrap();
    let record_len = log_event(0).to_record().unwrap().len() as u64;
    let config = QueueConfig {
        // 500 events cross this threshold at least twice.
        max_segment_size: record_len * 150,
        ..Default::default()
    };
    let (queue, sink) = logs_queue(dir.path(), config);

    for i in 0..500 {
        queue.append(&log_event(i));
    }
    queue.flush().unwrap();
    let segments = queue.closed_segments().unwrap();
    assert!(segments.len() >= 2, "only {} segments", segments.len());

    let collector = Collector {
        statuses: Arc::new(Mutex::new(VecDeque::from(vec![503, 200]))),
        ..Default::default()
    };
    let addr = start_collector(collector.clone()).await;
    let uploader = HttpUploader::new(upload_config(addr)).unwrap();
    let mut worker = UploadWorker::new(queue.clone(), uploader, fast_delay(), RetryPolicy::default());

    let before = worker.current_delay();
    let first = worker.tick().await;
    assert_eq!(
        first,
        TickOutcome::Retried {
            segment: segments[0],
            attempts: 1,
            response: UploadResponse::Status(503)
        }
    );
    assert_eq!(worker.attempts(segments[0]), 1);
    assert!(worker.current_delay() > before);
    assert!(queue.closed_segments().unwrap().contains(&segments[0]));

    let second = worker.tick().await;
    assert!(matches!(second, TickOutcome::Delivered { more_pending: true, .. }));
    assert!(!queue.closed_segments().unwrap().contains(&segments[0]));

    // The retried body was resent unchanged.
    let received = collector.received.lock().unwrap().clone();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].body, received[1].body);
    assert!(sink.snapshot().is_empty());
}

fn rum_session() -> Vec<RumEvent> {
    let view = |date, version, active| {
        RumEvent::View(RumViewEvent {
            date,
            session: SessionInfo { id: "session-1".into() },
            view: ViewInfo {
                id: "view-1".into(),
                name: Some("Checkout".into()),
                url: Some("app/checkout".into()),
                is_active: Some(active),
            },
            dd: DdInfo {
                document_version: Some(version),
                session: Some(DdSession { plan: Some(SessionPlan::LITE) }),
            },
        })
    };
    let child_view = ViewInfo {
        id: "view-1".into(),
        name: None,
        url: None,
        is_active: None,
    };

    vec![
        view(1_000, 1, true),
        RumEvent::Action(RumActionEvent {
            date: 1_100,
            session: SessionInfo { id: "session-1".into() },
            view: child_view.clone(),
            dd: DdInfo::with_plan(SessionPlan::LITE),
            action: ActionInfo {
                action_type: "tap".into(),
                target: Some("Pay".into()),
            },
        }),
        RumEvent::Resource(RumResourceEvent {
            date: 1_200,
            session: SessionInfo { id: "session-1".into() },
            view: child_view,
            dd: DdInfo::with_plan(SessionPlan::LITE),
            resource: ResourceInfo {
                id: "resource-1".into(),
                url: "https://api.example.com/pay".into(),
                resource_type: "xhr".into(),
                method: Some("POST".into()),
                status_code: Some(200),
                duration: Some(80_000_000),
            },
        }),
        view(1_300, 2, false),
    ]
}

#[tokio::test]
async fn test_pipeline_delivers_and_verifies() {
    let dir = tempdir().unwrap();
    let collector = Collector::default();
    let addr = start_collector(collector.clone()).await;

    let config = NodeConfig {
        storage_root: dir.path().to_path_buf(),
        queue: QueueConfig::default(),
        upload: upload_config(addr),
    };
    let sink = MemorySink::new();
    let uploader = HttpUploader::new(config.upload.clone()).unwrap();
    let pipeline = Pipeline::start(&config, uploader, sink.clone()).unwrap();

    let root = SpanEvent::root(TraceId(0x1f), SpanId(0xa1), "checkout", "shop", 1_000).finished(400);
    let child = SpanEvent::child_of(&root, SpanId(0xa2), "pay", 1_150).finished(100);
    let mut log = LogEvent::new(1_160, LogStatus::Info, "paying", "shop", "main");
    log.link_to_span(&child);

    for event in rum_session() {
        pipeline.write(&event.into());
    }
    pipeline.write(&root.into());
    pipeline.write(&child.into());
    pipeline.write(&log.into());
    pipeline.flush();

    for _ in 0..100 {
        if pipeline.pending_segments() == 0 && collector.received.lock().unwrap().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    pipeline.shutdown().await;

    let received = collector.received.lock().unwrap().clone();
    assert_eq!(received.len(), 3);
    assert!(sink.snapshot().is_empty());

    let body = |category: EventCategory| {
        received
            .iter()
            .find(|r| r.category == category.as_str())
            .map(|r| r.body.clone())
            .unwrap()
    };

    let rum: Vec<RumEvent> = payload::decode(PayloadFormat::JsonArray, &body(EventCategory::Rum)).unwrap();
    let sessions = reconstruct(&rum).unwrap();
    assert_eq!(sessions.len(), 1);
    let visit = &sessions[0].view_visits()[0];
    assert_eq!(visit.name(), "Checkout");
    assert_eq!(visit.view_events().len(), 2);
    assert_eq!(visit.action_events().len(), 1);
    assert_eq!(visit.resource_events().len(), 1);
    assert!(visit.is_closed());

    let spans: Vec<SpanEvent> = payload::decode(PayloadFormat::NdJson, &body(EventCategory::Traces)).unwrap();
    let logs: Vec<LogEvent> = payload::decode(PayloadFormat::JsonArray, &body(EventCategory::Logs)).unwrap();
    let links = link_logs(&spans, &logs).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].span.name, "pay");

    let events: Vec<Event> = rum.into_iter().map(Event::from).collect();
    assert!(events.iter().all(|e| e.category() == EventCategory::Rum));
}

#[tokio::test]
async fn test_shutdown_leaves_undelivered_data_on_disk() {
    let dir = tempdir().unwrap();
    let collector = Collector {
        statuses: Arc::new(Mutex::new(VecDeque::from(vec![503; 50]))),
        ..Default::default()
    };
    let addr = start_collector(collector).await;

    let config = NodeConfig {
        storage_root: dir.path().to_path_buf(),
        queue: QueueConfig::default(),
        upload: upload_config(addr),
    };
    let uploader = HttpUploader::new(config.upload.clone()).unwrap();
    let pipeline = Pipeline::start(&config, uploader, MemorySink::new()).unwrap();

    pipeline.write(&log_event(1));
    pipeline.flush();
    tokio::time::sleep(Duration::from_millis(200)).await;
    pipeline.shutdown().await;

    let sink = MemorySink::new();
    let reopened = pulse_node::storage::PersistentQueue::open(
        config.queue_dir(EventCategory::Logs),
        EventCategory::Logs,
        QueueConfig::default(),
        sink,
    )
    .unwrap();
    assert_eq!(reopened.closed_segments().unwrap().len(), 1);
}
