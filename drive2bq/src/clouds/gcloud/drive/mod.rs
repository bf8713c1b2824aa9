//! Interfaces to Google Drive.

mod download_file;
mod ls;

pub(crate) use download_file::download_file;
pub(crate) use ls::ls;

/// The base URL for Drive API v3 files.
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
