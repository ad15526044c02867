//! Data models shared across the pipeline.

pub mod config;
pub mod document;

pub use config::{DocketConfig, OutputNaming};
pub use document::{DocumentFile, DocumentType, RunId};
