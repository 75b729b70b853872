//! HTTP tests: the router is served on an ephemeral port and driven with
//! reqwest. Embeddings come from `HashProvider`, the index is an in-memory
//! `LocalIndex` and the generator always fails.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;

use ragflow::config::Config;
use ragflow::embedding::HashProvider;
use ragflow::generation::Generator;
use ragflow::index::LocalIndex;
use ragflow::pipeline::Pipeline;
use ragflow::server::router;

const BODY_LIMIT: usize = 64 * 1024;

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        anyhow::bail!("boom")
    }
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

async fn serve() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.data.dir = tmp.path().join("data");
    config.index.path = None;
    config.server.max_upload_bytes = BODY_LIMIT;

    let pipeline = Arc::new(Pipeline::new(
        config,
        Arc::new(HashProvider::new(256)),
        Arc::new(LocalIndex::in_memory()),
        Some(Arc::new(FailingGenerator) as Arc<dyn Generator>),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipeline)).await.unwrap();
    });

    TestServer {
        _tmp: tmp,
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

fn upload(name: &str, bytes: &[u8]) -> Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    json!({ "files": [ { "name": name, "content_base64": encoded } ] })
}

/// Text whose JSON upload body lands at roughly `body_bytes`.
fn text_for_body(body_bytes: usize) -> Vec<u8> {
    "vacation days policy "
        .repeat(body_bytes * 3 / 4 / 21)
        .into_bytes()
}

#[tokio::test]
async fn health_reports_version() {
    let server = serve().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_then_status_counts_entries() {
    let server = serve().await;
    let (status, body) = server
        .post("/ingest", &upload("handbook.md", b"Employees receive 25 vacation days."))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "1 documents ingested successfully.");

    let (status, body) = server.get("/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["collection"], "enterprise_docs");
    assert_eq!(body["entries"], 1);
}

#[tokio::test]
async fn unreadable_upload_reports_failure_status() {
    let server = serve().await;
    let (status, body) = server.post("/ingest", &upload("deck.pptx", b"PK\x03\x04")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["message"], "No readable documents found.");
}

#[tokio::test]
async fn generation_failure_is_answered_with_success_status() {
    let server = serve().await;
    server
        .post("/ingest", &upload("handbook.md", b"Employees receive 25 vacation days."))
        .await;

    let (status, body) = server
        .post("/query", &json!({ "question": "How many vacation days?" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "⚠️ Error generating response: boom");
    assert_eq!(body["sources"], json!([]));
}

#[tokio::test]
async fn query_before_ingestion_has_no_context() {
    let server = serve().await;
    let (status, body) = server.post("/query", &json!({ "question": "anything" })).await;
    assert_eq!(status, 200);
    assert_eq!(
        body["answer"],
        "No relevant context found in the ingested documents."
    );
}

#[tokio::test]
async fn invalid_base64_is_bad_request() {
    let server = serve().await;
    let (status, body) = server
        .post(
            "/ingest",
            &json!({ "files": [ { "name": "a.txt", "content_base64": "***not base64***" } ] }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("a.txt"));
}

#[tokio::test]
async fn malformed_json_keeps_error_shape() {
    let server = serve().await;
    let resp = server
        .client
        .post(server.url("/query"))
        .header("content-type", "application/json")
        .body("{\"question\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn upload_just_under_limit_is_accepted() {
    let server = serve().await;
    let payload = upload("big.txt", &text_for_body(BODY_LIMIT - 4 * 1024));
    assert!(serde_json::to_vec(&payload).unwrap().len() < BODY_LIMIT);

    let (status, body) = server.post("/ingest", &payload).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn upload_over_limit_is_rejected_as_json() {
    let server = serve().await;
    let payload = upload("big.txt", &text_for_body(BODY_LIMIT + 4 * 1024));
    assert!(serde_json::to_vec(&payload).unwrap().len() > BODY_LIMIT);

    let (status, body) = server.post("/ingest", &payload).await;
    assert_eq!(status, 413);
    assert_eq!(body["error"]["code"], "payload_too_large");

    let (_, status_body) = server.get("/status").await;
    assert_eq!(status_body["entries"], 0);
}
