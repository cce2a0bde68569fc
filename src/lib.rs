//! Fable RAG service
//!
//! Wires the `fable-rag` engine to its environment: configuration, the
//! application context handed to request handlers, and the HTTP API.

pub mod app;
pub mod config;
pub mod server;

pub use app::{initialize, AppContext};
pub use config::AppConfig;
pub use server::{router, serve};
