//! HttpTransport integration tests against an in-process server.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use filedrop_core::{
    testing::fixtures, FileHandle, HttpTransport, OrchestratorConfig, TransportConfig,
    UploadError, UploadOrchestrator, UploadState, UploadTransport,
};

/// A multipart upload received by the test server.
#[derive(Debug, Clone)]
struct ReceivedUpload {
    uuid: String,
    field: String,
    file_name: Option<String>,
    data: Vec<u8>,
}

/// How the test server responds.
#[derive(Debug, Clone)]
struct Behavior {
    destination_status: StatusCode,
    upload_status: StatusCode,
    upload_delay: Duration,
    /// Answer step 1 with `requestId`/`destinationURL` and an absolute URL.
    aliased_fields: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            destination_status: StatusCode::OK,
            upload_status: StatusCode::OK,
            upload_delay: Duration::ZERO,
            aliased_fields: false,
        }
    }
}

#[derive(Clone)]
struct ServerState {
    behavior: Behavior,
    base_url: Arc<Mutex<String>>,
    issued: Arc<Mutex<Vec<String>>>,
    received: Arc<Mutex<Vec<ReceivedUpload>>>,
}

async fn get_url(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    if state.behavior.destination_status != StatusCode::OK {
        return (state.behavior.destination_status, Json(json!({})));
    }

    let uuid = uuid::Uuid::new_v4().to_string();
    state.issued.lock().await.push(uuid.clone());

    let body = if state.behavior.aliased_fields {
        let base = state.base_url.lock().await.clone();
        json!({ "requestId": uuid, "destinationURL": format!("{}/api/upload", base) })
    } else {
        json!({ "uuid": uuid, "url": "/api/upload" })
    };
    (StatusCode::OK, Json(body))
}

async fn upload(
    State(state): State<ServerState>,
    Path(uuid): Path<String>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    if !state.behavior.upload_delay.is_zero() {
        tokio::time::sleep(state.behavior.upload_delay).await;
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.received.lock().await.push(ReceivedUpload {
            uuid: uuid.clone(),
            field: name,
            file_name,
            data,
        });
    }

    (
        state.behavior.upload_status,
        Json(json!({ "data": "File uploaded successfully" })),
    )
}

/// Start the test server and return its state and base URL.
async fn spawn_server(behavior: Behavior) -> (ServerState, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let state = ServerState {
        behavior,
        base_url: Arc::new(Mutex::new(base_url.clone())),
        issued: Arc::new(Mutex::new(Vec::new())),
        received: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/api/getUrl", get(get_url))
        .route("/api/upload/{uuid}", post(upload))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, base_url)
}

fn transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(TransportConfig::new(base_url)).unwrap()
}

#[tokio::test]
async fn test_two_step_upload() {
    let (state, base_url) = spawn_server(Behavior::default()).await;
    let transport = transport(&base_url);

    let file = FileHandle::from_bytes("hello.txt", b"hello world".to_vec())
        .with_content_type("text/plain");
    transport
        .upload(&file, &CancellationToken::new())
        .await
        .unwrap();

    let issued = state.issued.lock().await.clone();
    let received = state.received.lock().await.clone();
    assert_eq!(issued.len(), 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].uuid, issued[0]);
    assert_eq!(received[0].field, "file");
    assert_eq!(received[0].file_name.as_deref(), Some("hello.txt"));
    assert_eq!(received[0].data, b"hello world".to_vec());
}

#[tokio::test]
async fn test_request_destination_resolves_relative_url() {
    let (state, base_url) = spawn_server(Behavior::default()).await;
    let destination = transport(&base_url).request_destination().await.unwrap();

    let issued = state.issued.lock().await.clone();
    assert_eq!(destination.request_id, issued[0]);
    assert_eq!(
        destination.url,
        format!("{}/api/upload/{}", base_url, issued[0])
    );
}

#[tokio::test]
async fn test_aliased_destination_fields() {
    let (state, base_url) = spawn_server(Behavior {
        aliased_fields: true,
        ..Default::default()
    })
    .await;

    transport(&base_url)
        .upload(&fixtures::file("a.txt"), &CancellationToken::new())
        .await
        .unwrap();

    let received = state.received.lock().await.clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].file_name.as_deref(), Some("a.txt"));
}

#[tokio::test]
async fn test_custom_field_name() {
    let (state, base_url) = spawn_server(Behavior::default()).await;
    let mut config = TransportConfig::new(base_url);
    config.field_name = "attachment".to_string();
    let transport = HttpTransport::new(config).unwrap();

    transport
        .upload(&fixtures::file("b.txt"), &CancellationToken::new())
        .await
        .unwrap();

    let received = state.received.lock().await.clone();
    assert_eq!(received[0].field, "attachment");
}

#[tokio::test]
async fn test_destination_error_status() {
    let (state, base_url) = spawn_server(Behavior {
        destination_status: StatusCode::SERVICE_UNAVAILABLE,
        ..Default::default()
    })
    .await;

    let err = transport(&base_url)
        .upload(&fixtures::file("c.txt"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::DestinationUnavailable { .. }));
    assert!(err.to_string().contains("503"));
    assert!(state.received.lock().await.is_empty());
}

#[tokio::test]
async fn test_destination_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = transport(&base_url)
        .request_destination()
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::DestinationUnavailable { .. }));
}

#[tokio::test]
async fn test_upload_error_status() {
    let (_state, base_url) = spawn_server(Behavior {
        upload_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..Default::default()
    })
    .await;

    let err = transport(&base_url)
        .upload(&fixtures::file("d.txt"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::TransferFailed { .. }));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_cancel_aborts_slow_submit() {
    let (_state, base_url) = spawn_server(Behavior {
        upload_delay: Duration::from_secs(10),
        ..Default::default()
    })
    .await;
    let transport = transport(&base_url);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = transport
        .upload(&fixtures::file("big.bin"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, UploadError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancelled_submit_sends_nothing() {
    let (state, base_url) = spawn_server(Behavior::default()).await;
    let transport = transport(&base_url);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.bin");
    tokio::fs::write(&path, vec![0u8; 4 * 1024 * 1024]).await.unwrap();

    let destination = transport.request_destination().await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = transport
        .submit(&FileHandle::from_path(&path), &destination, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, UploadError::Cancelled);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.received.lock().await.is_empty());
}

#[tokio::test]
async fn test_missing_source_file_fails_transfer() {
    let (_state, base_url) = spawn_server(Behavior::default()).await;

    let err = transport(&base_url)
        .upload(
            &FileHandle::from_path("/nonexistent/missing.dat"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::TransferFailed { .. }));
}

#[tokio::test]
async fn test_orchestrated_batch_over_http() {
    let (state, base_url) = spawn_server(Behavior::default()).await;

    let dir = tempfile::tempdir().unwrap();
    let on_disk = dir.path().join("photo.jpg");
    tokio::fs::write(&on_disk, b"\xff\xd8\xff jpeg bytes")
        .await
        .unwrap();

    let files = vec![
        fixtures::file("first.txt"),
        FileHandle::from_path(&on_disk),
        fixtures::file("third.txt"),
    ];

    let handle = UploadOrchestrator::spawn(
        OrchestratorConfig::default(),
        Arc::new(transport(&base_url)),
    );
    handle.start_batch(files).await.unwrap();

    let done = tokio::time::timeout(Duration::from_secs(10), handle.wait_until_settled())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.state, UploadState::Completed);
    assert_eq!(done.progress, 100.0);

    let received = state.received.lock().await.clone();
    let names: Vec<_> = received
        .iter()
        .map(|r| r.file_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["first.txt", "photo.jpg", "third.txt"]);
    assert_eq!(received[1].data, b"\xff\xd8\xff jpeg bytes".to_vec());
}
