// Inter-process communication via Unix domain sockets with length-prefixed JSON protocol

use crate::error::{Result, SiftError};
use crate::retrieval::{QueryRequest, RetrievalError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Maximum message size (10MB)
const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// IPC message types sent from the CLI to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IpcMessage {
    /// Run a retrieval query
    Search(QueryRequest),
    /// Request server status
    Status,
}

/// IPC response message sent from server back to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure class (`configuration`, `upstream_model`, `timeout`, `internal`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl IpcResponse {
    /// Create a successful response with data
    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error_kind: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error_kind: None,
        }
    }

    /// Create an error response for a failed query
    pub fn failure(error: &RetrievalError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            data: None,
            error_kind: Some(error.kind().to_string()),
        }
    }
}

/// Unix domain socket server for IPC
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }

    /// Bind to the socket path and start listening
    pub async fn bind(&mut self) -> Result<()> {
        // Remove stale socket file left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| SiftError::Io {
                source: e,
                context: format!("Failed to remove existing socket: {:?}", self.socket_path),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SiftError::Io {
                source: e,
                context: format!("Failed to create socket directory: {:?}", parent),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| SiftError::Io {
            source: e,
            context: format!("Failed to bind to socket: {:?}", self.socket_path),
        })?;

        self.listener = Some(listener);

        tracing::info!("IPC server listening on {:?}", self.socket_path);
        Ok(())
    }

    /// Accept incoming connections
    pub async fn accept(&self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| SiftError::Server("Server not bound".to_string()))?;

        let (stream, _addr) = listener.accept().await.map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to accept connection".to_string(),
        })?;

        Ok(stream)
    }

    /// Shutdown the server and clean up socket file
    pub fn shutdown(&mut self) -> Result<()> {
        self.listener = None;
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| SiftError::Io {
                source: e,
                context: format!("Failed to remove socket: {:?}", self.socket_path),
            })?;
        }
        Ok(())
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Read one length-prefixed JSON frame
pub async fn read_frame<T: DeserializeOwned>(stream: &mut UnixStream) -> Result<T> {
    // 4-byte big-endian length prefix
    let length = stream.read_u32().await.map_err(|e| SiftError::Io {
        source: e,
        context: "Failed to read message length".to_string(),
    })?;

    if length > MAX_MESSAGE_SIZE {
        return Err(SiftError::Server(format!(
            "Message too large: {} bytes (max: {})",
            length, MAX_MESSAGE_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    stream
        .read_exact(&mut buffer)
        .await
        .map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to read message payload".to_string(),
        })?;

    serde_json::from_slice(&buffer).map_err(|e| SiftError::Json {
        source: e,
        context: "Failed to deserialize IPC message".to_string(),
    })
}

/// Write one length-prefixed JSON frame
pub async fn write_frame<T: Serialize>(stream: &mut UnixStream, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value).map_err(|e| SiftError::Json {
        source: e,
        context: "Failed to serialize IPC message".to_string(),
    })?;

    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(SiftError::Server(format!(
            "Message too large: {} bytes (max: {})",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    stream
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to write message length".to_string(),
        })?;

    stream
        .write_all(&payload)
        .await
        .map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to write message payload".to_string(),
        })?;

    stream.flush().await.map_err(|e| SiftError::Io {
        source: e,
        context: "Failed to flush message".to_string(),
    })?;

    Ok(())
}

/// IPC client for sending messages to the server
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a new IPC client
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Connect to the server and send a message, returning the response
    pub async fn send(&self, message: &IpcMessage) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound | IoErrorKind::ConnectionRefused => {
                    SiftError::ServerNotRunning {
                        socket: self.socket_path.clone(),
                    }
                }
                _ => SiftError::Io {
                    source: e,
                    context: format!("Failed to connect to server at {:?}", self.socket_path),
                },
            })?;

        write_frame(&mut stream, message).await?;
        read_frame(&mut stream).await
    }
}
