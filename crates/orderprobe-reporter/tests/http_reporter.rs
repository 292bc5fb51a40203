//! HttpReporter against a local collector stub.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::Value;

use orderprobe_core::{LatencyRecord, OrderRequest, OrderSide, Price, Quantity};
use orderprobe_reporter::{HttpReporter, LatencySink, ReportError};

type Received = Arc<Mutex<Vec<Value>>>;

#[derive(Clone)]
struct Collector {
    received: Received,
    status: StatusCode,
    delay: Duration,
}

async fn collect(State(collector): State<Collector>, Json(body): Json<Value>) -> StatusCode {
    tokio::time::sleep(collector.delay).await;
    collector.received.lock().push(body);
    collector.status
}

async fn spawn_collector(status: StatusCode, delay: Duration) -> (String, Received) {
    let received = Received::default();
    let app = Router::new().route("/latency", post(collect)).with_state(Collector {
        received: received.clone(),
        status,
        delay,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/latency"), received)
}

fn record() -> LatencyRecord {
    let request = OrderRequest::new("2330", OrderSide::Buy, Price::new(dec!(580)), Quantity(1));
    LatencyRecord::new("paper", &request, Duration::from_millis(25), false)
}

#[tokio::test]
async fn test_submit_posts_report() {
    let (url, received) = spawn_collector(StatusCode::OK, Duration::ZERO).await;
    let reporter = HttpReporter::new(url, Duration::from_secs(5)).unwrap();

    reporter.submit(record());
    assert!(reporter.drain(Duration::from_secs(5)).await);

    let bodies = received.lock().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["broker"], "paper");
    assert_eq!(bodies[0]["symbol"], "2330");
    assert_eq!(bodies[0]["side"], "B");
    assert_eq!(bodies[0]["latency_ms"], 25.0);
    assert_eq!(bodies[0]["price"], 580.0);
    assert_eq!(bodies[0]["volume"], 1);
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let (url, received) = spawn_collector(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
    let reporter = HttpReporter::new(url, Duration::from_secs(5)).unwrap();

    let err = reporter.deliver(&record()).await.unwrap_err();
    assert!(matches!(err, ReportError::Status { status: 500, .. }));
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test]
async fn test_slow_collector_times_out() {
    let (url, _received) = spawn_collector(StatusCode::OK, Duration::from_secs(2)).await;
    let reporter = HttpReporter::new(url, Duration::from_millis(100)).unwrap();

    let err = reporter.deliver(&record()).await.unwrap_err();
    assert!(matches!(err, ReportError::HttpClient(_)));
}

#[tokio::test]
async fn test_submit_does_not_block_on_slow_collector() {
    let (url, _received) = spawn_collector(StatusCode::OK, Duration::from_secs(2)).await;
    let reporter = HttpReporter::new(url, Duration::from_secs(5)).unwrap();

    let started = std::time::Instant::now();
    reporter.submit(record());
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(reporter.in_flight(), 1);

    assert!(!reporter.drain(Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_unreachable_collector_is_swallowed() {
    let reporter = HttpReporter::new("http://127.0.0.1:9/latency", Duration::from_millis(500)).unwrap();
    reporter.submit(record());
    assert!(reporter.drain(Duration::from_secs(5)).await);
}
