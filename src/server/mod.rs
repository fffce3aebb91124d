// Server module: serves a retrieval pipeline over a Unix socket

mod ipc;
mod signals;

pub use ipc::{read_frame, write_frame, IpcClient, IpcMessage, IpcResponse, IpcServer};
pub use signals::{Signal, SignalHandler};

use crate::error::{Result, SiftError};
use crate::retrieval::RetrievalPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixStream;

/// Server status as reported to `status` requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub documents: usize,
    pub embedding_model: String,
    pub dimension: usize,
    pub reranker_model: String,
    pub index_kind: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

/// Long-running query server around one shared pipeline
pub struct Server {
    pipeline: Arc<RetrievalPipeline>,
    socket_path: PathBuf,
}

impl Server {
    pub fn new(pipeline: Arc<RetrievalPipeline>, socket_path: PathBuf) -> Self {
        Self {
            pipeline,
            socket_path,
        }
    }

    /// Serve until SIGTERM, SIGINT or SIGHUP
    pub async fn run(self) -> Result<()> {
        let mut signal_handler = SignalHandler::new()?;
        self.serve_until(async move {
            let signal = signal_handler.wait().await;
            tracing::info!("Shutdown signal received: {}", signal);
        })
        .await
    }

    /// Serve until `shutdown` completes, then remove the socket file
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ipc_server = IpcServer::new(self.socket_path.clone());
        ipc_server.bind().await?;

        let started_at = Utc::now();
        tracing::info!(
            "Server started: {} documents, {} + {}",
            self.pipeline.index().len(),
            self.pipeline.index().binding(),
            self.pipeline.reranker().model_name()
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = ipc_server.accept() => match accepted {
                    Ok(stream) => {
                        let pipeline = Arc::clone(&self.pipeline);
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, pipeline, started_at).await {
                                tracing::error!("Client handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("{}", e),
                },

                _ = &mut shutdown => break,
            }
        }

        tracing::info!("Shutting down server");
        ipc_server.shutdown()?;
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Handle a client connection
async fn handle_client(
    mut stream: UnixStream,
    pipeline: Arc<RetrievalPipeline>,
    started_at: DateTime<Utc>,
) -> Result<()> {
    let message: IpcMessage = match read_frame(&mut stream).await {
        Ok(message) => message,
        Err(SiftError::Json { source, .. }) => {
            let response = IpcResponse::error(format!("Malformed request: {}", source));
            return write_frame(&mut stream, &response).await;
        }
        Err(e) => return Err(e),
    };

    let response = match message {
        IpcMessage::Search(request) => match pipeline.retrieve(&request).await {
            Ok(output) => match serde_json::to_value(&output) {
                Ok(data) => IpcResponse::success_with_data(data),
                Err(e) => IpcResponse::error(format!("Failed to encode results: {}", e)),
            },
            Err(e) => {
                tracing::warn!("Query failed ({}): {}", e.kind(), e);
                IpcResponse::failure(&e)
            }
        },
        IpcMessage::Status => {
            let status = status_of(&pipeline, started_at);
            match serde_json::to_value(&status) {
                Ok(data) => IpcResponse::success_with_data(data),
                Err(e) => IpcResponse::error(format!("Failed to encode status: {}", e)),
            }
        }
    };

    write_frame(&mut stream, &response).await
}

fn status_of(pipeline: &RetrievalPipeline, started_at: DateTime<Utc>) -> ServerStatus {
    let binding = pipeline.index().binding();
    ServerStatus {
        status: "ok".to_string(),
        documents: pipeline.index().len(),
        embedding_model: binding.model.clone(),
        dimension: binding.dimension,
        reranker_model: pipeline.reranker().model_name().to_string(),
        index_kind: pipeline.index().kind().to_string(),
        started_at,
        uptime_secs: (Utc::now() - started_at).num_seconds(),
    }
}
