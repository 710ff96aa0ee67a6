//! `docreader-server` exposes document upload and question answering over
//! HTTP. Uploads are extracted, chunked, embedded and indexed in memory;
//! questions are answered from the nearest indexed chunks.

pub mod config;
pub mod server;
pub mod storage;

pub use config::{EmbedderBackend, ServerConfig};
pub use server::{AppState, app_router, run_server};
pub use storage::{StoredUpload, UploadStore};
