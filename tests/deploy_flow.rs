// tests/deploy_flow.rs

mod common;
use crate::common::builders::RequestBuilder;
use crate::common::{SharedBuffer, capture_writer, init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Json, Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::{Value, json};

use opd_supervisor::actions::deploy::{self, DeploySettings, hash_tree};
use opd_supervisor::protocol::Outcome;
use opd_supervisor::types::{EventKind, Reason};

type TestResult = Result<(), Box<dyn Error>>;

const TOKEN: &str = "secret-token";
const LIMIT: Duration = Duration::from_secs(20);

/// In-memory stand-in for the deploy API.
#[derive(Default)]
struct FakeApi {
    manifest: Mutex<Option<Value>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    polls: AtomicU32,
    end_in_error: bool,
    /// Answer the first status poll with a 502.
    flaky_first_poll: bool,
    /// Live state reported once processing finishes; "ready" when unset.
    live_state: Option<&'static str>,
    never_ready: bool,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn create_deploy(
    State(api): State<Arc<FakeApi>>,
    UrlPath(site): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }

    // Pretend only HTML files are new.
    let required: Vec<Value> = body["files"]
        .as_object()
        .map(|files| {
            files
                .iter()
                .filter(|(path, _)| path.ends_with(".html"))
                .map(|(_, sha)| sha.clone())
                .collect()
        })
        .unwrap_or_default();
    *api.manifest.lock().unwrap() = Some(body);

    Json(json!({
        "id": "d1",
        "state": "uploading",
        "required": required,
        "ssl_url": format!("https://{site}.example"),
        "deploy_ssl_url": format!("https://d1--{site}.example"),
        "admin_url": format!("https://app.example/sites/{site}"),
    }))
    .into_response()
}

async fn upload_file(
    State(api): State<Arc<FakeApi>>,
    UrlPath((id, path)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&headers) || id != "d1" {
        return StatusCode::UNAUTHORIZED;
    }
    api.uploads
        .lock()
        .unwrap()
        .push((path.trim_start_matches('/').to_string(), body.to_vec()));
    StatusCode::OK
}

async fn get_deploy(State(api): State<Arc<FakeApi>>, UrlPath(id): UrlPath<String>) -> Response {
    let poll = api.polls.fetch_add(1, Ordering::SeqCst);
    if poll == 0 && api.flaky_first_poll {
        return (StatusCode::BAD_GATEWAY, "upstream hiccup").into_response();
    }
    let state = match (poll, api.end_in_error) {
        _ if api.never_ready => "processing",
        (0, _) => "processing",
        (_, true) => "error",
        (_, false) => api.live_state.unwrap_or("ready"),
    };
    Json(json!({
        "id": id,
        "state": state,
        "error_message": "build exploded",
        "ssl_url": "https://demo.example",
        "deploy_ssl_url": "https://d1--demo.example",
        "admin_url": "https://app.example/sites/demo",
    }))
    .into_response()
}

async fn spawn_api(api: Arc<FakeApi>) -> std::io::Result<String> {
    let app = Router::new()
        .route("/sites/{site}/deploys", post(create_deploy))
        .route("/deploys/{id}", get(get_deploy))
        .route("/deploys/{id}/files/{*path}", put(upload_file))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok(format!("http://{addr}"))
}

fn settings(api_base: String) -> DeploySettings {
    DeploySettings {
        api_base,
        poll_interval: Duration::from_millis(10),
        poll_attempts: 5,
        timeout_exit_code: 124,
    }
}

fn site_dir(root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(root.join("css"))?;
    fs::write(root.join("index.html"), "<h1>hello</h1>")?;
    fs::write(root.join("css/site.css"), "body{}")?;
    Ok(())
}

#[test]
fn hash_tree_keys_files_by_rooted_path() -> TestResult {
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;

    let files = hash_tree(dir.path())?;
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["/css/site.css", "/index.html"]);
    assert!(files.iter().all(|f| f.sha1.len() == 40));
    Ok(())
}

#[tokio::test]
async fn draft_deploy_uploads_only_required_files() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;
    let api = Arc::new(FakeApi::default());
    let base = spawn_api(Arc::clone(&api)).await?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .build();
    let outcome = with_timeout(
        LIMIT,
        deploy::run(&req, &settings(base), Some(TOKEN.to_string()), &writer),
    )
    .await?;
    assert!(outcome.ok, "{:?}", buf.events());

    assert_eq!(
        buf.data_of(EventKind::Status),
        vec!["hashing", "creating", "uploading 1", "finalizing"]
    );

    let manifest = api.manifest.lock().unwrap().clone().unwrap();
    assert_eq!(manifest["draft"], json!(true));
    let files = manifest["files"].as_object().unwrap();
    assert!(files.contains_key("/index.html"));
    assert!(files.contains_key("/css/site.css"));

    let uploads = api.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "index.html");
    assert_eq!(uploads[0].1, b"<h1>hello</h1>".to_vec());
    assert!(api.polls.load(Ordering::SeqCst) >= 2);

    let extra = buf.terminal().extra.unwrap();
    assert_eq!(extra["url"], json!("https://d1--demo.example"));
    assert_eq!(extra["logsUrl"], json!("https://app.example/sites/demo/deploys/d1"));
    assert_eq!(extra["deployId"], json!("d1"));
    Ok(())
}

#[tokio::test]
async fn production_deploy_reports_site_url() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;
    let api = Arc::new(FakeApi::default());
    let base = spawn_api(Arc::clone(&api)).await?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .prod(true)
        .build();
    let outcome = with_timeout(
        LIMIT,
        deploy::run(&req, &settings(base), Some(TOKEN.to_string()), &writer),
    )
    .await?;

    assert!(outcome.ok);
    let manifest = api.manifest.lock().unwrap().clone().unwrap();
    assert_eq!(manifest["draft"], json!(false));
    assert_eq!(buf.terminal().extra.unwrap()["url"], json!("https://demo.example"));
    Ok(())
}

#[tokio::test]
async fn missing_token_fails_with_auth_before_any_request() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .build();
    // Nothing listens here; reaching the network would fail differently.
    let outcome = deploy::run(&req, &settings("http://127.0.0.1:9".into()), None, &writer).await;

    assert_eq!(outcome.reason, Some(Reason::Auth));
    assert!(buf.data_of(EventKind::Status).is_empty());
    assert_eq!(buf.terminal().reason, Some(Reason::Auth));
    Ok(())
}

#[tokio::test]
async fn rejected_token_maps_to_auth_reason() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;
    let api = Arc::new(FakeApi::default());
    let base = spawn_api(Arc::clone(&api)).await?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .build();
    let outcome = with_timeout(
        LIMIT,
        deploy::run(&req, &settings(base), Some("wrong".to_string()), &writer),
    )
    .await?;

    assert_eq!(outcome.reason, Some(Reason::Auth));
    let errors: Vec<_> = buf
        .events()
        .into_iter()
        .filter(|e| e.event == EventKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].error.as_deref().unwrap_or("").contains("401"));
    Ok(())
}

#[tokio::test]
async fn remote_error_state_fails_the_deploy() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;
    let api = Arc::new(FakeApi {
        end_in_error: true,
        ..FakeApi::default()
    });
    let base = spawn_api(Arc::clone(&api)).await?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .build();
    let outcome = with_timeout(
        LIMIT,
        deploy::run(&req, &settings(base), Some(TOKEN.to_string()), &writer),
    )
    .await?;

    assert!(!outcome.ok);
    assert_eq!(outcome.reason, None);
    let events = buf.events();
    let error = events.iter().find(|e| e.event == EventKind::Error).unwrap();
    assert!(error.error.as_deref().unwrap_or("").contains("build exploded"));
    Ok(())
}

async fn deploy_against(api: Arc<FakeApi>) -> Result<(Outcome, SharedBuffer), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    site_dir(dir.path())?;
    let base = spawn_api(api).await?;

    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir")
        .src(dir.path().to_string_lossy())
        .site("demo")
        .build();
    let outcome = with_timeout(
        LIMIT,
        deploy::run(&req, &settings(base), Some(TOKEN.to_string()), &writer),
    )
    .await?;
    Ok((outcome, buf))
}

#[tokio::test]
async fn transient_poll_failure_is_retried() -> TestResult {
    init_tracing();
    let api = Arc::new(FakeApi {
        flaky_first_poll: true,
        ..FakeApi::default()
    });
    let (outcome, buf) = deploy_against(Arc::clone(&api)).await?;

    assert!(outcome.ok, "{:?}", buf.events());
    assert!(buf.events().iter().all(|e| e.event != EventKind::Error));
    assert!(api.polls.load(Ordering::SeqCst) >= 2);
    Ok(())
}

#[tokio::test]
async fn current_state_counts_as_live() -> TestResult {
    init_tracing();
    let api = Arc::new(FakeApi {
        live_state: Some("current"),
        ..FakeApi::default()
    });
    let (outcome, buf) = deploy_against(api).await?;

    assert!(outcome.ok, "{:?}", buf.events());
    assert_eq!(buf.terminal().extra.unwrap()["deployId"], json!("d1"));
    Ok(())
}

#[tokio::test]
async fn exhausted_polling_reports_timeout() -> TestResult {
    init_tracing();
    let api = Arc::new(FakeApi {
        never_ready: true,
        ..FakeApi::default()
    });
    let (outcome, buf) = deploy_against(Arc::clone(&api)).await?;

    assert!(!outcome.ok);
    assert_eq!(outcome.exit_code, 124);
    assert_eq!(outcome.reason, Some(Reason::Timeout));
    assert_eq!(api.polls.load(Ordering::SeqCst), 5);

    let events = buf.events();
    let error = events.iter().find(|e| e.event == EventKind::Error).unwrap();
    assert!(error.error.as_deref().unwrap_or("").contains("not ready"));
    let done = buf.terminal();
    assert_eq!(done.exit_code, Some(124));
    assert_eq!(done.reason, Some(Reason::Timeout));
    Ok(())
}

#[tokio::test]
async fn missing_site_is_invalid_args() -> TestResult {
    init_tracing();
    let (writer, buf) = capture_writer();
    let req = RequestBuilder::new("netlify-deploy-dir").src("/tmp").build();
    let outcome = deploy::run(&req, &settings("http://127.0.0.1:9".into()), Some(TOKEN.into()), &writer).await;

    assert_eq!(outcome.reason, Some(Reason::InvalidArgs));
    assert_eq!(buf.terminal().reason, Some(Reason::InvalidArgs));
    Ok(())
}
