mod common;

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use askdoc::config::Config;
use askdoc::server::{app, AppState};

use common::{HashEmbedder, ScriptedModel, COURSE};

/// Config whose documents root is `root`.
fn config_for(root: &Path) -> Config {
    let mut config = Config::minimal();
    config.server.documents_root = Some(root.to_path_buf());
    config
}

/// Serve the app on an ephemeral port with scripted providers.
async fn start_server(config: Config) -> String {
    let state = AppState::new(
        config,
        Arc::new(ScriptedModel::course()),
        Arc::new(HashEmbedder::default()),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let base = start_server(Config::minimal()).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(config_for(tmp.path())).await;
    let client = reqwest::Client::new();
    let doc = tmp.path().join("course.txt");
    fs::write(&doc, COURSE).unwrap();

    let id = create_session(&client, &base).await;

    // Asking before a document is loaded
    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "How are you?" }),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "not_initialized");

    // Load
    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, id),
        json!({ "path": doc.display().to_string() }),
    )
    .await;
    assert_eq!(status, 200, "load failed: {body}");
    assert_eq!(body["pages"], 1);
    assert_eq!(body["segments"], 1);
    assert_eq!(body["content_type"], "text/plain");
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 64);

    // Ask
    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "What is the total duration?" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["route"], "GLOBAL");
    assert!(body["answer"].as_str().unwrap().starts_with("answer"));

    // Transcript
    let transcript: Value = client
        .get(format!("{}/sessions/{}/transcript", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transcript["initialized"], true);
    let turns = transcript["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["text"], "What is the total duration?");
    assert_eq!(turns[1]["role"], "assistant");

    // Reset
    let resp = client
        .post(format!("{}/sessions/{}/reset", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "How are you?" }),
    )
    .await;
    assert_eq!(status, 409);

    // Delete
    let resp = client
        .delete(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "How are you?" }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_load_missing_document_is_ingest_failed() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(config_for(tmp.path())).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, id),
        json!({ "path": "handbook.pdf" }),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "ingest_failed");
}

#[tokio::test]
async fn test_relative_path_resolves_under_documents_root() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("courses")).unwrap();
    fs::write(tmp.path().join("courses").join("course.txt"), COURSE).unwrap();
    let base = start_server(config_for(tmp.path())).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, id),
        json!({ "path": "courses/course.txt" }),
    )
    .await;
    assert_eq!(status, 200, "load failed: {body}");
    assert!(body["path"].as_str().unwrap().ends_with("course.txt"));
}

#[tokio::test]
async fn test_documents_outside_root_are_rejected() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let private = elsewhere.path().join("private_notes.txt");
    fs::write(&private, COURSE).unwrap();
    fs::write(root.path().join("course.txt"), COURSE).unwrap();

    let base = start_server(config_for(root.path())).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let attempts = [
        private.display().to_string(),
        format!("../{}/private_notes.txt", elsewhere.path().file_name().unwrap().to_str().unwrap()),
        "../no_such_file.txt".to_string(),
        "/etc/hostname".to_string(),
    ];
    for path in attempts {
        let (status, body) = post_json(
            &client,
            format!("{}/sessions/{}/document", base, id),
            json!({ "path": path }),
        )
        .await;
        assert_eq!(status, 400, "{path} was not rejected: {body}");
        assert_eq!(body["error"]["code"], "bad_request");
    }

    // Nothing was loaded
    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "What is the total duration?" }),
    )
    .await;
    assert_eq!(status, 409);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_out_of_root_is_rejected() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let private = elsewhere.path().join("private_notes.txt");
    fs::write(&private, COURSE).unwrap();
    std::os::unix::fs::symlink(&private, root.path().join("notes.txt")).unwrap();

    let base = start_server(config_for(root.path())).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, id),
        json!({ "path": "notes.txt" }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_cross_origin_denied_by_default() {
    let base = start_server(Config::minimal()).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/sessions", base))
        .header("Origin", "http://evil.example")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    let resp = client
        .post(format!("{}/sessions", base))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_configured_origin_is_allowed() {
    let mut config = Config::minimal();
    config.server.cors_origins = vec!["http://localhost:3000".to_string()];
    let base = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/sessions", base))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );

    let resp = client
        .post(format!("{}/sessions", base))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_session_limit() {
    let mut config = Config::minimal();
    config.server.max_sessions = 2;
    let base = start_server(config).await;
    let client = reqwest::Client::new();

    let first = create_session(&client, &base).await;
    create_session(&client, &base).await;

    let resp = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "session_limit");

    // Deleting one frees a slot
    let resp = client
        .delete(format!("{}/sessions/{}", base, first))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    create_session(&client, &base).await;
}

#[tokio::test]
async fn test_idle_sessions_expire() {
    let mut config = Config::minimal();
    config.server.max_sessions = 1;
    config.server.session_idle_secs = 1;
    let base = start_server(config).await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &base).await;
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let resp = client
        .get(format!("{}/sessions/{}/transcript", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // The expired session no longer counts against the limit
    create_session(&client, &base).await;
}

#[tokio::test]
async fn test_empty_inputs_are_bad_requests() {
    let base = start_server(Config::minimal()).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, id),
        json!({ "question": "   " }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, id),
        json!({ "path": "" }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let base = start_server(Config::minimal()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/sessions/not-a-uuid/transcript", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!(
            "{}/sessions/00000000-0000-4000-8000-000000000000",
            base
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(config_for(tmp.path())).await;
    let client = reqwest::Client::new();
    let doc = tmp.path().join("course.md");
    fs::write(&doc, COURSE).unwrap();

    let a = create_session(&client, &base).await;
    let b = create_session(&client, &base).await;
    assert_ne!(a, b);

    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/document", base, a),
        json!({ "path": doc.display().to_string() }),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, a),
        json!({ "question": "What is covered in week 2?" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["route"], "LOCAL");

    let (status, _) = post_json(
        &client,
        format!("{}/sessions/{}/ask", base, b),
        json!({ "question": "What is covered in week 2?" }),
    )
    .await;
    assert_eq!(status, 409);
}
