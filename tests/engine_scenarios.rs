//! Engine-level coverage (§4.F / §8) against a hand-rolled HTTP double
//! instead of a mocking crate (none appears anywhere in the reference
//! corpus): a bare `tokio::net::TcpListener` that understands just enough
//! HTTP/1.1 to answer the cluster's scroll/update calls and the Argos
//! interpreter's `/languages`/`/translate` calls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use es_translator::argos::ArgosInterpreter;
use es_translator::cluster::ClusterClient;
use es_translator::engine::{self, EngineConfig};
use es_translator::error::CoreError;
use es_translator::interpreter::Interpreter;
use es_translator::search::SearchStream;

struct FakeCluster {
    base_url: String,
    save_success: Arc<AtomicUsize>,
}

/// Starts the double on an OS-assigned loopback port and serves requests
/// for as long as the test runs. `docs` is returned as a single scroll
/// page; the continuation page is always empty, ending the stream after
/// one round trip. Updates to an id in `fail_ids` come back `500`.
async fn spawn_fake_cluster(
    docs: Vec<(String, String)>,
    fail_ids: HashSet<String>,
    translate_delay: Duration,
) -> FakeCluster {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let save_success = Arc::new(AtomicUsize::new(0));

    let docs = Arc::new(docs);
    let fail_ids = Arc::new(fail_ids);
    let counter = save_success.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let docs = docs.clone();
            let fail_ids = fail_ids.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, &docs, &fail_ids, &counter, translate_delay).await;
            });
        }
    });

    FakeCluster {
        base_url: format!("http://{addr}"),
        save_success,
    }
}

async fn serve_one(
    mut socket: TcpStream,
    docs: &[(String, String)],
    fail_ids: &HashSet<String>,
    save_success: &AtomicUsize,
    translate_delay: Duration,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or_default().to_string();
    let full_path = request_parts.next().unwrap_or_default().to_string();
    let path = full_path.split('?').next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    for line in lines {
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    if method == "POST" && path == "/translate" {
        tokio::time::sleep(translate_delay).await;
    }

    let (status, payload) = route(&method, &path, docs, fail_ids, save_success);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        payload.len(),
        payload
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

fn route(
    method: &str,
    path: &str,
    docs: &[(String, String)],
    fail_ids: &HashSet<String>,
    save_success: &AtomicUsize,
) -> (&'static str, String) {
    if method == "GET" && path == "/languages" {
        return (
            "200 OK",
            json!({"languages": [{"code": "en", "targets": ["es"]}]}).to_string(),
        );
    }
    if method == "POST" && path == "/translate" {
        return ("200 OK", json!({"translatedText": "mock-translation"}).to_string());
    }
    if method == "POST" && path == "/_search/scroll" {
        return ("200 OK", json!({"_scroll_id": null, "hits": {"hits": []}}).to_string());
    }
    if method == "POST" && path.ends_with("/_search") {
        let hits: Vec<_> = docs
            .iter()
            .map(|(id, content)| {
                json!({
                    "_index": "docs",
                    "_id": id,
                    "_routing": null,
                    "_source": {"content": content},
                })
            })
            .collect();
        return (
            "200 OK",
            json!({"_scroll_id": "scroll-1", "hits": {"hits": hits}}).to_string(),
        );
    }
    if method == "POST" && path.contains("/_update/") {
        let id = path.rsplit('/').next().unwrap_or_default();
        if fail_ids.contains(id) {
            return (
                "500 Internal Server Error",
                json!({"error": "simulated update failure"}).to_string(),
            );
        }
        save_success.fetch_add(1, Ordering::SeqCst);
        return ("200 OK", "{}".to_string());
    }
    ("404 Not Found", "{}".to_string())
}

async fn argos_interpreter(base_url: &str) -> Interpreter {
    let interpreter = ArgosInterpreter::new("en", "es", None, None, base_url, "cpu")
        .await
        .expect("argos interpreter against the fake cluster");
    Interpreter::Argos(interpreter)
}

async fn open_stream(base_url: &str, batch_size: usize) -> SearchStream {
    let client = ClusterClient::new(base_url).unwrap();
    SearchStream::open(client, "docs", None, &["content", "content_translated"], batch_size, "1m")
        .await
        .expect("open search stream against the fake cluster")
}

/// §8 "QueueFull": a single worker with a deliberately small pool timeout
/// must retry enqueuing rather than drop work, and still land every hit.
#[tokio::test]
async fn queue_full_retries_until_every_hit_is_processed() {
    let docs: Vec<(String, String)> = (1..=50).map(|i| (i.to_string(), "hello world".to_string())).collect();
    let fake = spawn_fake_cluster(docs.clone(), HashSet::new(), Duration::from_millis(15)).await;

    let interpreter = Arc::new(argos_interpreter(&fake.base_url).await);
    let stream = open_stream(&fake.base_url, docs.len()).await;

    let cfg = EngineConfig {
        pool_size: 1,
        pool_timeout: Duration::from_millis(5),
        throttle: Duration::from_millis(0),
        dry_run: false,
        force: false,
        max_content_length: -1,
        source_field: "content".to_string(),
        target_field: "content_translated".to_string(),
        cluster_url: fake.base_url.clone(),
    };

    let result = engine::run(stream, interpreter, cfg).await;
    assert!(result.is_ok(), "expected the run to finish despite queue-full retries: {result:?}");
    assert_eq!(fake.save_success.load(Ordering::SeqCst), 50);
}

/// §8 fatal propagation: a save failure partway through a run sets the
/// fatal cell exactly once, in-flight work finishes, and no hit queued
/// behind the failure is ever dequeued.
#[tokio::test]
async fn save_failure_aborts_the_run_without_processing_later_hits() {
    let docs: Vec<(String, String)> = (1..=20).map(|i| (i.to_string(), "hello world".to_string())).collect();
    let mut fail_ids = HashSet::new();
    fail_ids.insert("5".to_string());
    let fake = spawn_fake_cluster(docs.clone(), fail_ids, Duration::from_millis(0)).await;

    let interpreter = Arc::new(argos_interpreter(&fake.base_url).await);
    let stream = open_stream(&fake.base_url, docs.len()).await;

    let cfg = EngineConfig {
        pool_size: 1,
        pool_timeout: Duration::from_millis(50),
        throttle: Duration::from_millis(0),
        dry_run: false,
        force: false,
        max_content_length: -1,
        source_field: "content".to_string(),
        target_field: "content_translated".to_string(),
        cluster_url: fake.base_url.clone(),
    };

    let result = engine::run(stream, interpreter, cfg).await;
    match result {
        Err(CoreError::FatalTranslation(message)) => {
            assert!(
                message.contains("doc 5"),
                "fatal message should name the failing doc: {message}"
            );
        }
        other => panic!("expected a fatal translation error, got {other:?}"),
    }
    // Single worker processes hits in order: docs 1-4 succeed, doc 5 fails
    // and sets the fatal cell, docs 6-20 are never dequeued.
    assert_eq!(fake.save_success.load(Ordering::SeqCst), 4);
}
