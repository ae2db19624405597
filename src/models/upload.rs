//! Files handed over by the upload transport, and the per-batch report.

use crate::errors::FieldError;
use crate::services::object_store::PutBody;
use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;

/// A single file received by the upload transport.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side file name.
    pub name: String,
    pub size_bytes: u64,
    pub content: UploadContent,
    /// Transport-level failure for this file (e.g. a truncated part).
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum UploadContent {
    Memory(Bytes),
    TempFile(PathBuf),
}

impl UploadedFile {
    pub fn in_memory(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size_bytes: data.len() as u64,
            content: UploadContent::Memory(data),
            error: None,
        }
    }

    pub fn on_disk(name: impl Into<String>, path: PathBuf, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            content: UploadContent::TempFile(path),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: 0,
            content: UploadContent::Memory(Bytes::new()),
            error: Some(error.into()),
        }
    }

    pub(crate) fn into_body(self) -> PutBody {
        match self.content {
            UploadContent::Memory(data) => PutBody::Bytes(data),
            UploadContent::TempFile(path) => PutBody::File(path),
        }
    }
}

/// Outcome of a batch upload. The batch as a whole always succeeds; rejected
/// or failed files are listed in `errors`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UploadReport {
    pub directory: String,
    pub uploaded: Vec<String>,
    pub errors: Vec<FieldError>,
}
