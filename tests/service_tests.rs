//! End-to-end tests for fetch, send and upload against a scripted server.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portalink::adapter::memory_credentials::MemoryCredentialStore;
use portalink::domain::{
    DataError, FetchRequest, NetworkError, Priority, RequestError, SendRequest, UploadRequest,
};
use portalink::infrastructure::config::timing::BackoffConfig;
use portalink::port::credentials::CredentialStore;
use portalink::port::transport::{Method, RequestBody, TransportError};
use portalink::service::{InterfaceEvent, PortalService};
use portalink::testkit::config::config;
use portalink::testkit::domain::{embedded_error, login_ok, records};
use portalink::testkit::transport::{path_ends_with, Scripted, ScriptedTransport};
use serde_json::json;

use support::{eventually, start, start_with_store, start_without_credentials, within};

/// Logins hand out `s0`, `s1`, ...; everything else goes to `data`.
fn portal<F>(data: F) -> Arc<ScriptedTransport>
where
    F: Fn(usize) -> Scripted + Send + Sync + 'static,
{
    let logins = AtomicUsize::new(0);
    let calls = AtomicUsize::new(0);
    Arc::new(ScriptedTransport::new(move |request| {
        if path_ends_with(request, "/login") {
            let n = logins.fetch_add(1, Ordering::SeqCst);
            Scripted::ok(login_ok(&format!("s{n}")))
        } else {
            data(calls.fetch_add(1, Ordering::SeqCst))
        }
    }))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_request_logs_in_with_form_credentials() {
    let transport = portal(|_| Scripted::ok(records(json!("hello"))));
    let service = start(Arc::clone(&transport));

    let data = within(service.fetch(FetchRequest::new("greeting"))).await;

    assert_eq!(data, Ok(json!([{ "data": "hello" }])));
    let login = &transport.requests_to("/login")[0];
    assert_eq!(login.method, Method::Post);
    assert_eq!(
        login.body,
        RequestBody::Form(vec![
            ("AuthUserName".into(), "5551234".into()),
            ("AuthPassword".into(), "secret".into()),
            ("version".into(), "8.0".into()),
        ])
    );
    assert!(service.has_session());
    service.shutdown().await;
}

#[tokio::test]
async fn expired_session_refetches_once_and_delivers_once() {
    let transport = portal(|call| match call {
        0 => Scripted::status(403),
        _ => Scripted::ok(records(json!({ "n": 1 }))),
    });
    let service = start(Arc::clone(&transport));

    let data = within(service.fetch(FetchRequest::new("contacts"))).await;

    assert_eq!(data, Ok(json!([{ "data": { "n": 1 } }])));
    assert_eq!(transport.count("/login"), 2);
    let fetches = transport.requests_to("/data.js");
    assert_eq!(fetches.len(), 2);
    assert!(fetches[0].url.path().contains("/sessions0/"));
    assert!(fetches[1].url.path().contains("/sessions1/"));
    assert_eq!(fetches[1].query_param("data").as_deref(), Some("contacts"));
    service.shutdown().await;
}

#[tokio::test]
async fn embedded_session_expiry_is_never_reported() {
    let transport = portal(|call| match call {
        0 => Scripted::ok(embedded_error("sessionExpired")),
        _ => Scripted::ok(records(json!(true))),
    });
    let service = start(Arc::clone(&transport));

    let data = within(
        service.fetch(FetchRequest::new("prefs").report_network_errors()),
    )
    .await;

    assert_eq!(data, Ok(json!([{ "data": true }])));
    assert_eq!(transport.count("/login"), 2);
    service.shutdown().await;
}

#[tokio::test]
async fn new_credentials_end_a_backoff_wait() {
    let transport = portal(|_| Scripted::ok(records(json!("ready"))));
    let mut slow = config();
    slow.backoff = BackoffConfig {
        initial_ms: 3000,
        max_doublings: 4,
    };
    let service = PortalService::start(
        slow,
        transport.clone(),
        Arc::new(MemoryCredentialStore::new()),
    )
    .unwrap();

    let pending =
        service.fetch(FetchRequest::new("contacts").with_priority(Priority::Foreground));
    assert!(eventually(|| service.backoff_delay().is_some()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    service.set_credentials("5551234", "secret", false);
    let data = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("credentials did not end the backoff wait");

    assert_eq!(data, Ok(json!([{ "data": "ready" }])));
    assert_eq!(transport.count("/login"), 1);
    service.shutdown().await;
}

#[tokio::test]
async fn rejected_credentials_are_forgotten() {
    let transport = Arc::new(ScriptedTransport::new(|request| {
        if path_ends_with(request, "/login") {
            Scripted::ok(embedded_error("authenticationFailed"))
        } else {
            Scripted::status(500)
        }
    }));
    let store = Arc::new(MemoryCredentialStore::new());
    let service = start_with_store(Arc::clone(&transport), Arc::clone(&store));
    service.set_credentials("5551234", "wrong", true);

    let pending = service.fetch(FetchRequest::new("contacts"));

    assert!(eventually(|| store.load_password().is_none()).await);
    assert_eq!(store.load_username().as_deref(), Some("5551234"));
    assert!(!service.has_session());
    // No password left, so no further logins go out.
    let attempts = transport.count("/login");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.count("/login"), attempts);

    service.shutdown().await;
    assert_eq!(pending.await, Err(RequestError::Cancelled));
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn application_error_reaches_data_error_only() {
    let transport = portal(|_| Scripted::ok(embedded_error("someAppError")));
    let service = start(Arc::clone(&transport));

    let result = within(service.fetch(FetchRequest::new("voicemail"))).await;

    assert_eq!(
        result,
        Err(RequestError::Data(DataError::Application("someAppError".into())))
    );
    assert_eq!(transport.count("/data.js"), 1);
    service.shutdown().await;
}

#[tokio::test]
async fn bad_request_is_reported_and_backs_off() {
    let transport = portal(|_| Scripted::status(400));
    let service = start(Arc::clone(&transport));

    let result = within(service.fetch(FetchRequest::new("voicemail"))).await;

    assert_eq!(result, Err(RequestError::Data(DataError::BadRequest)));
    assert!(service.backoff_delay().is_some());
    service.shutdown().await;
}

#[tokio::test]
async fn network_errors_reach_callers_that_ask() {
    let transport = portal(|call| match call {
        0 => Scripted::error(TransportError::Connect("refused".into())),
        _ => Scripted::status(503),
    });
    let service = start(Arc::clone(&transport));

    let first = within(service.fetch(FetchRequest::new("a").report_network_errors())).await;
    let second = within(service.fetch(FetchRequest::new("b").report_network_errors())).await;

    assert_eq!(first, Err(RequestError::Network(NetworkError::Unavailable)));
    assert_eq!(
        second,
        Err(RequestError::Network(NetworkError::ServerUnavailable))
    );
    service.shutdown().await;
}

#[tokio::test]
async fn silent_requests_retry_until_the_server_recovers() {
    let transport = portal(|call| match call {
        0 => Scripted::status(503),
        1 => Scripted::ok("not json"),
        _ => Scripted::ok(records(json!(42))),
    });
    let service = start(Arc::clone(&transport));

    let data = within(service.fetch(FetchRequest::new("count"))).await;

    assert_eq!(data, Ok(json!([{ "data": 42 }])));
    assert_eq!(transport.count("/data.js"), 3);
    assert_eq!(service.backoff_delay(), None);
    service.shutdown().await;
}

#[tokio::test]
async fn rejected_data_is_fetched_again() {
    let transport = portal(|call| Scripted::ok(records(json!({ "version": call }))));
    let service = start(Arc::clone(&transport));

    let request = FetchRequest::new("contacts")
        .with_validator(|data| data[0]["data"]["version"] == json!(2));
    let data = within(service.fetch(request)).await;

    assert_eq!(data, Ok(json!([{ "data": { "version": 2 } }])));
    assert_eq!(transport.count("/data.js"), 3);
    service.shutdown().await;
}

// ---------------------------------------------------------------------------
// Send and upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_posts_envelope_and_returns_errors_now() {
    let transport = portal(|_| Scripted::ok(""));
    let service = start(Arc::clone(&transport));

    let request =
        SendRequest::with_value("prefs", json!({ "ring": 3 })).with_priority(Priority::Foreground);
    let result = within(service.send(request)).await;

    assert_eq!(result, Ok(()));
    let sent = &transport.requests_to("/data.js")[0];
    assert_eq!(sent.method, Method::Post);
    assert_eq!(sent.query_param("returnerrorsnow").as_deref(), Some("true"));
    assert_eq!(
        sent.body,
        RequestBody::Json(json!({ "data": [{ "data": { "ring": 3 }, "dataType": "prefs" }] }))
    );
    service.shutdown().await;
}

#[tokio::test]
async fn send_payload_is_built_when_transmitted() {
    let transport = portal(|_| Scripted::ok("[]"));
    let service = start(Arc::clone(&transport));
    let built = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&built);
    let request = SendRequest::new("prefs", move || {
        json!({ "built": counter.fetch_add(1, Ordering::SeqCst) })
    });
    within(service.send(request)).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    service.shutdown().await;
}

#[tokio::test]
async fn upload_posts_file_under_session() {
    let transport = portal(|_| Scripted::ok(""));
    let service = start(Arc::clone(&transport));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.zip");
    std::fs::write(&path, b"zipdata").unwrap();

    let result = within(service.upload(UploadRequest::new(
        &path,
        "/line/logupload?filename=logs.zip",
    )))
    .await;

    assert_eq!(result, Ok(()));
    let upload = &transport.requests_to("/line/logupload")[0];
    assert_eq!(upload.url.path(), "/cust/sessions0/line/logupload");
    assert_eq!(upload.query_param("filename").as_deref(), Some("logs.zip"));
    assert_eq!(
        upload.body,
        RequestBody::File {
            field: "file".into(),
            file_name: "logs.zip".into(),
            contents: b"zipdata".to_vec(),
        }
    );
    service.shutdown().await;
}

#[tokio::test]
async fn missing_upload_file_is_not_found_without_backoff() {
    let transport = portal(|_| Scripted::ok(""));
    let service = start(Arc::clone(&transport));
    let dir = tempfile::tempdir().unwrap();

    let result = within(service.upload(UploadRequest::new(
        dir.path().join("missing.zip"),
        "/line/logupload?filename=missing.zip",
    )))
    .await;

    assert_eq!(result, Err(RequestError::Data(DataError::NotFound)));
    assert!(transport.requests().is_empty());
    assert_eq!(service.backoff_delay(), None);
    service.shutdown().await;
}

// ---------------------------------------------------------------------------
// Network monitor and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_are_refused_while_offline() {
    let transport = portal(|_| Scripted::ok(records(json!(1))));
    let service = start(Arc::clone(&transport));

    service.on_interface_event(InterfaceEvent::Down("eth0".into()));
    assert!(!service.is_connected());

    let refused = within(service.fetch(FetchRequest::new("a").report_network_errors())).await;
    assert_eq!(refused, Err(RequestError::Network(NetworkError::Unavailable)));
    assert!(transport.requests().is_empty());

    service.on_interface_event(InterfaceEvent::Up("eth0".into()));
    assert!(service.is_connected());
    let data = within(service.fetch(FetchRequest::new("a").report_network_errors())).await;
    assert_eq!(data, Ok(json!([{ "data": 1 }])));
    service.shutdown().await;
}

#[tokio::test]
async fn losing_the_network_fails_queued_reporting_requests() {
    let transport = portal(|_| Scripted::ok(records(json!(1))));
    let service = start_without_credentials(Arc::clone(&transport));

    let reporting = service.fetch(FetchRequest::new("a").report_network_errors());
    let silent = service.fetch(FetchRequest::new("b"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    service.on_interface_event(InterfaceEvent::Up("eth0".into()));
    service.on_interface_event(InterfaceEvent::Down("eth0".into()));

    assert_eq!(
        within(reporting).await,
        Err(RequestError::Network(NetworkError::Unavailable))
    );

    service.shutdown().await;
    assert_eq!(silent.await, Err(RequestError::Cancelled));
}

#[tokio::test]
async fn shutdown_cancels_outstanding_and_later_requests() {
    let transport = portal(|_| Scripted::ok(records(json!(1))));
    let service = start_without_credentials(Arc::clone(&transport));

    let pending = service.fetch(FetchRequest::new("a"));
    service.shutdown().await;

    assert!(!service.is_running());
    assert_eq!(within(pending).await, Err(RequestError::Cancelled));
    let late = service.fetch(FetchRequest::new("b"));
    assert_eq!(within(late).await, Err(RequestError::Cancelled));
}
