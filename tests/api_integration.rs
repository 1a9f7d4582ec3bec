mod support;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::POST, MockServer};
use research_assistant::{
    api::{RouterOptions, create_router},
    embedding::HashEmbeddingClient,
    llm::OpenAiChatClient,
    processing::{RagService, RagSettings},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use support::pdf::minimal_pdf;
use tower::ServiceExt;

const BOUNDARY: &str = "integration-boundary";

fn router_for(server: &MockServer) -> Router {
    let chat = OpenAiChatClient::new(
        server.url("/v1"),
        "test-model".into(),
        None,
        0.0,
        Duration::from_secs(5),
    )
    .expect("chat client");
    let settings = RagSettings {
        chunk_size: 40,
        chunk_overlap: 8,
        retrieval_top_k: 2,
        ..RagSettings::default()
    };
    let service = RagService::with_clients(
        Box::new(HashEmbeddingClient::new(128)),
        Box::new(chat),
        settings,
    )
    .expect("service");
    create_router(Arc::new(service), RouterOptions::default())
}

fn upload(filename: &str, bytes: Vec<u8>) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
         filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(&bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn ask(doc_id: &str, question: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/ask")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "doc_id": doc_id, "question": question, "history": [] }).to_string(),
        ))
        .expect("request")
}

fn bare(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn upload_ask_summarize_delete_flow() {
    let server = MockServer::start_async().await;
    let answer_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("question-answering");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "It uses self attention." } }]
            }));
        })
        .await;
    let summary_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("CONCISE SUMMARY");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "A paper about attention." } }]
            }));
        })
        .await;
    let app = router_for(&server);

    let pdf = minimal_pdf(&[
        "Transformers use self attention to relate every token in a sequence.",
        "Convolutional networks exploit spatial locality in images.",
    ]);
    let (status, body) = call(&app, upload("paper.pdf", pdf)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let doc_id = body["doc_id"].as_str().expect("doc_id").to_string();

    let (status, body) = call(&app, ask(&doc_id, "How do transformers relate tokens?")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["answer"], "It uses self attention.");
    let citations = body["citations"].as_array().expect("citations");
    assert!(!citations.is_empty());
    assert!(citations.len() <= 2);
    for citation in citations {
        let page = citation["page"].as_u64().expect("page");
        assert!((1..=2).contains(&page));
        assert!(!citation["content"].as_str().expect("content").is_empty());
    }
    answer_mock.assert_async().await;

    let (status, body) = call(&app, bare(Method::GET, &format!("/api/summary/{doc_id}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["summary"], "A paper about attention.");
    summary_mock.assert_async().await;

    let (status, body) = call(&app, bare(Method::GET, "/api/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"][0]["doc_id"], doc_id.as_str());
    assert_eq!(body["documents"][0]["page_count"], 2);

    let delete_uri = format!("/api/documents/{doc_id}");
    let (status, _) = call(&app, bare(Method::DELETE, &delete_uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, ask(&doc_id, "Still there?")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, bare(Method::GET, &format!("/api/summary/{doc_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, bare(Method::DELETE, &delete_uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, bare(Method::GET, "/api/metrics")).await;
    assert_eq!(body["documents_indexed"], 1);
    assert_eq!(body["questions_answered"], 1);
    assert_eq!(body["summaries_generated"], 1);
    assert_eq!(body["documents_deleted"], 1);
}

#[tokio::test]
async fn textless_pdf_is_rejected_and_not_registered() {
    let server = MockServer::start_async().await;
    let app = router_for(&server);

    let (status, body) = call(&app, upload("scan.pdf", minimal_pdf(&["", ""]))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (_, body) = call(&app, bare(Method::GET, "/api/documents")).await;
    assert_eq!(body["documents"], json!([]));
}

#[tokio::test]
async fn non_pdf_upload_is_bad_request() {
    let server = MockServer::start_async().await;
    let app = router_for(&server);

    let (status, body) = call(&app, upload("notes.txt", b"hello".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only PDF files are supported.");
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let server = MockServer::start_async().await;
    let app = router_for(&server);

    let (status, body) = call(&app, ask("00000000-0000-0000-0000-000000000000", "Why?")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Document not found. Please upload it again.");
}
