//! Download a file from Google Drive.

use bytes::BufMut;
use serde::Serialize;

use super::{
    super::{percent_encode, Alt, Client},
    FILES_URL,
};
use crate::common::*;

#[derive(Debug, Serialize)]
struct DownloadQuery {
    /// What format should we return?
    alt: Alt,
}

/// Download the contents of `file` into memory, logging progress as we go.
#[instrument(level = "trace", skip(client, file), fields(file = %file))]
pub(crate) async fn download_file(client: &Client, file: &FileRef) -> Result<Bytes> {
    let url = format!("{}/{}", FILES_URL, percent_encode(&file.id));
    let query = DownloadQuery { alt: Alt::Media };
    let response = client
        .get_response(&url, query)
        .await
        .with_context(|| format!("could not download {}", file))?;

    let expected_len = response.content_length();
    let mut progress = DownloadProgress::new(expected_len);
    let mut buffer = BytesMut::with_capacity(
        expected_len
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0),
    );
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("error downloading {}", file))?;
        buffer.put(chunk);
        if let Some(percent) = progress.advance(buffer.len() as u64) {
            info!("Download {}%.", percent);
        }
    }

    // Did we download the number of bytes the `Content-Length` header promised?
    if let Some(expected_len) = expected_len {
        if expected_len != buffer.len() as u64 {
            return Err(format_err!(
                "expected to download {} bytes of {}, received {}",
                expected_len,
                file,
                buffer.len(),
            ));
        }
    }
    debug!("downloaded {} bytes from {}", buffer.len(), file);
    Ok(buffer.freeze())
}

/// Decides when to report download progress. We report each 10% step once.
#[derive(Debug)]
struct DownloadProgress {
    /// The total size, if the server told us.
    total: Option<u64>,
    /// The last percentage we reported.
    last_reported: Option<u64>,
}

impl DownloadProgress {
    fn new(total: Option<u64>) -> Self {
        DownloadProgress {
            total,
            last_reported: None,
        }
    }

    /// Record that we've received `received` bytes in total. Returns a
    /// percentage to log if we've crossed a new 10% step.
    fn advance(&mut self, received: u64) -> Option<u64> {
        let total = self.total?;
        let percent = if total == 0 {
            100
        } else {
            (received.min(total) * 100 / total) / 10 * 10
        };
        if percent > 0 && Some(percent) > self.last_reported {
            self.last_reported = Some(percent);
            Some(percent)
        } else {
            None
        }
    }
}

#[test]
fn progress_reports_each_step_once() {
    let mut progress = DownloadProgress::new(Some(1000));
    assert_eq!(progress.advance(50), None);
    assert_eq!(progress.advance(100), Some(10));
    assert_eq!(progress.advance(150), None);
    assert_eq!(progress.advance(350), Some(30));
    assert_eq!(progress.advance(1000), Some(100));
    assert_eq!(progress.advance(1000), None);
}

#[test]
fn progress_needs_a_known_length() {
    let mut progress = DownloadProgress::new(None);
    assert_eq!(progress.advance(10_000), None);
}

#[test]
fn download_query_requests_media() {
    let query = serde_urlencoded::to_string(DownloadQuery { alt: Alt::Media }).unwrap();
    assert_eq!(query, "alt=media");
}
