//! Sift - Two-Stage Document Retrieval
//!
//! Indexes a document collection with a bi-encoder, retrieves the nearest neighbours of
//! each query by inner product, and reorders them with a cross-encoder. Usable as a
//! library, a one-shot CLI, or a long-running server on a Unix socket.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod server;

pub use error::{Result, SiftError};
