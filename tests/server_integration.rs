//! IPC server integration test: real socket, offline models

mod common;

use common::{offline_pipeline, sample_corpus};
use sift::embedding::IndexKind;
use sift::retrieval::{PipelineOptions, QueryRequest, RetrievalOutput};
use sift::server::{IpcClient, IpcMessage, IpcResponse, Server, ServerStatus};
use sift::SiftError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Poll until the server answers a status request
async fn wait_for_server(client: &IpcClient) -> IpcResponse {
    for _ in 0..100 {
        if let Ok(response) = client.send(&IpcMessage::Status).await {
            return response;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not come up");
}

#[tokio::test]
async fn test_server_search_and_status() {
    let temp = TempDir::new().unwrap();
    let socket_path = temp.path().join("run").join("sift.sock");

    let pipeline = offline_pipeline(sample_corpus(10), IndexKind::Flat, PipelineOptions::default());
    let server = Server::new(Arc::new(pipeline), socket_path.clone());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.serve_until(async {
        let _ = stop_rx.await;
    }));

    let client = IpcClient::new(socket_path.clone());

    // Status
    let response = wait_for_server(&client).await;
    assert!(response.success);
    let status: ServerStatus = serde_json::from_value(response.data.unwrap()).unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.documents, 10);
    assert_eq!(status.embedding_model, "hashing-256");
    assert_eq!(status.dimension, 256);
    assert_eq!(status.reranker_model, "term-overlap");
    assert_eq!(status.index_kind, "flat");

    // Search
    let response = client
        .send(&IpcMessage::Search(QueryRequest::new(
            "quantum computer prime factorization",
            2,
            10,
        )))
        .await
        .unwrap();
    assert!(response.success);
    let data = response.data.unwrap();
    assert!(data["results"][0]["meta"]["title"].is_string());
    assert!(data["rerank"].is_f64());

    let output: RetrievalOutput = serde_json::from_value(data).unwrap();
    assert_eq!(output.results.len(), 2);
    assert_eq!(output.results[0].id, "quant-ph/9508027");

    // Invalid request is reported, not dropped
    let response = client
        .send(&IpcMessage::Search(QueryRequest::new("   ", 5, 10)))
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("configuration"));

    // Shutdown removes the socket
    stop_tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();
    assert!(!Path::new(&socket_path).exists());

    let result = client.send(&IpcMessage::Status).await;
    assert!(matches!(result, Err(SiftError::ServerNotRunning { .. })));
}

#[tokio::test]
async fn test_server_reports_malformed_request() {
    use sift::server::{read_frame, write_frame};
    use tokio::net::UnixStream;

    let temp = TempDir::new().unwrap();
    let socket_path = temp.path().join("sift.sock");

    let pipeline = offline_pipeline(sample_corpus(3), IndexKind::Flat, PipelineOptions::default());
    let server = Server::new(Arc::new(pipeline), socket_path.clone());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.serve_until(async {
        let _ = stop_rx.await;
    }));

    wait_for_server(&IpcClient::new(socket_path.clone())).await;

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();
    write_frame(&mut stream, &serde_json::json!({"type": "rerank", "query": "x"}))
        .await
        .unwrap();
    let response: IpcResponse = read_frame(&mut stream).await.unwrap();
    assert!(!response.success);
    assert!(response.message.unwrap().starts_with("Malformed request"));

    stop_tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();
}
