//! Reading files from Google Drive.

use async_trait::async_trait;

use crate::clouds::gcloud::{drive, Client};
use crate::common::*;

/// A [`FileStorage`] that reads from Google Drive.
#[derive(Clone, Debug)]
pub struct DriveStorage {
    client: Client,
}

impl DriveStorage {
    pub(crate) fn new(client: Client) -> Self {
        DriveStorage { client }
    }
}

#[async_trait]
impl FileStorage for DriveStorage {
    async fn list_files(&self, folder_id: &str, mime_type: &str) -> Result<Vec<FileRef>> {
        drive::ls(&self.client, folder_id, mime_type).await
    }

    async fn download(&self, file: &FileRef) -> Result<Bytes> {
        drive::download_file(&self.client, file).await
    }
}
