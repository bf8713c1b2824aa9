//! In-memory fakes for testing the pipeline without Google Cloud.

use async_trait::async_trait;
use std::{
    io,
    sync::{Arc, Mutex},
};

use crate::common::*;
use crate::schema::ColumnSchema;

/// A [`FileStorage`] holding files in memory.
#[derive(Debug, Default)]
pub(crate) struct MemoryStorage {
    files: Vec<FileRef>,
    contents: Vec<Option<Bytes>>,
    fail_listing: bool,
}

impl MemoryStorage {
    /// Add a file with the given contents.
    pub(crate) fn with_file(mut self, id: &str, name: &str, data: &[u8]) -> Self {
        self.files.push(FileRef::new(id, name));
        self.contents.push(Some(Bytes::copy_from_slice(data)));
        self
    }

    /// Add a file which fails to download.
    pub(crate) fn with_broken_file(mut self, id: &str, name: &str) -> Self {
        self.files.push(FileRef::new(id, name));
        self.contents.push(None);
        self
    }

    /// Make listing fail.
    pub(crate) fn with_failed_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// The files we hold, in listing order.
    pub(crate) fn files(&self) -> &[FileRef] {
        &self.files
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn list_files(&self, _folder_id: &str, _mime_type: &str) -> Result<Vec<FileRef>> {
        if self.fail_listing {
            return Err(format_err!("permission denied listing folder"));
        }
        Ok(self.files.clone())
    }

    async fn download(&self, file: &FileRef) -> Result<Bytes> {
        let idx = self
            .files
            .iter()
            .position(|f| f == file)
            .ok_or_else(|| format_err!("no such file {}", file))?;
        self.contents[idx]
            .clone()
            .ok_or_else(|| format_err!("connection reset downloading {}", file))
    }
}

/// A [`Warehouse`] which records what it was asked to do.
#[derive(Debug, Default)]
pub(crate) struct RecordingWarehouse {
    fail_overwrite: bool,
    calls: Mutex<Vec<String>>,
    loaded: Mutex<Option<(RowBuffer, ColumnSchema)>>,
}

impl RecordingWarehouse {
    /// Make `overwrite` fail, the way a failed load job would.
    pub(crate) fn failing() -> Self {
        RecordingWarehouse {
            fail_overwrite: true,
            ..RecordingWarehouse::default()
        }
    }

    /// The names of the methods called on us, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// The buffer and schema passed to `overwrite`, if it was called.
    pub(crate) fn loaded(&self) -> Option<(RowBuffer, ColumnSchema)> {
        self.loaded.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_owned());
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    fn destination(&self) -> String {
        "test:gold.despesas".to_owned()
    }

    async fn ensure_dataset(&self) -> Result<()> {
        self.record("ensure_dataset");
        Ok(())
    }

    async fn ensure_table(&self, _schema: &ColumnSchema) -> Result<()> {
        self.record("ensure_table");
        Ok(())
    }

    async fn overwrite(
        &self,
        _ctx: &Context,
        buffer: &RowBuffer,
        schema: &ColumnSchema,
    ) -> Result<()> {
        self.record("overwrite");
        *self.loaded.lock().unwrap() = Some((buffer.clone(), schema.clone()));
        if self.fail_overwrite {
            Err(format_err!("invalid: Error while reading data"))
        } else {
            Ok(())
        }
    }
}

/// A log destination which keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub(crate) struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Everything logged so far.
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    /// The first logged line containing `needle`.
    pub(crate) fn line_containing(&self, needle: &str) -> Option<String> {
        self.contents()
            .lines()
            .find(|line| line.contains(needle))
            .map(|line| line.to_owned())
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
