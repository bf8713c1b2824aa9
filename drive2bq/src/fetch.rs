//! Downloading and concatenating CSV files.

use crate::common::*;
use crate::tabular::parse_csv;

/// The result of fetching every file in a listing.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// All the records we could parse, aligned by column name.
    pub buffer: RowBuffer,
    /// Files which were downloaded and parsed.
    pub loaded: usize,
    /// Files which failed and were skipped.
    pub skipped: usize,
}

/// Download and parse each of `files` in order, appending their records to a
/// single buffer.
///
/// A file which can't be downloaded, decoded or parsed is logged and skipped.
/// This never fails as a whole. If every file fails, the buffer is empty.
pub async fn fetch_and_concat(
    storage: &dyn FileStorage,
    files: &[FileRef],
    csv: &CsvOptions,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    for file in files {
        info!("Downloading {}", file);
        match fetch_one(storage, file, csv).await {
            Ok(buffer) => {
                debug!("read {} rows from {}", buffer.len(), file);
                outcome.buffer.append(buffer);
                outcome.loaded += 1;
            }
            Err(err) => {
                error!("skipping {}: {:#}", file, err);
                outcome.skipped += 1;
            }
        }
    }
    outcome
}

/// Download and parse a single file.
#[instrument(level = "trace", skip(storage, csv), fields(file = %file))]
async fn fetch_one(
    storage: &dyn FileStorage,
    file: &FileRef,
    csv: &CsvOptions,
) -> Result<RowBuffer> {
    let bytes = storage.download(file).await?;
    parse_csv(&bytes, csv).with_context(|| format!("could not parse {}", file.name))
}
