//! Remote file storage that we read CSV files from.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::common::*;

/// A remote file we haven't downloaded yet.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct FileRef {
    /// The storage provider's opaque ID for this file.
    pub id: String,
    /// The human-readable file name.
    pub name: String,
}

impl FileRef {
    /// Create a new `FileRef`.
    pub fn new<Id, Name>(id: Id, name: Name) -> Self
    where
        Id: Into<String>,
        Name: Into<String>,
    {
        FileRef {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A place we can list and download files from.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// List the files in `folder_id` with the MIME type `mime_type`, in the
    /// order the provider returns them. An empty folder is not an error.
    async fn list_files(&self, folder_id: &str, mime_type: &str) -> Result<Vec<FileRef>>;

    /// Download the complete contents of `file`.
    async fn download(&self, file: &FileRef) -> Result<Bytes>;
}
