//! Listing the files in a Drive folder.

use serde::{Deserialize, Serialize};

use super::{super::Client, FILES_URL};
use crate::common::*;

/// The largest page size Drive accepts.
const PAGE_SIZE: u32 = 1000;

/// URL query parameters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery<'a> {
    q: &'a str,
    fields: &'static str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

/// Response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    next_page_token: Option<String>,

    #[serde(default)]
    files: Vec<FileRef>,
}

/// List every file directly inside `folder_id` with the MIME type
/// `mime_type`, following all result pages.
#[instrument(level = "trace", skip(client))]
pub(crate) async fn ls(
    client: &Client,
    folder_id: &str,
    mime_type: &str,
) -> Result<Vec<FileRef>> {
    let q = folder_query(folder_id, mime_type);
    debug!("listing Drive files matching {}", q);

    let mut files = vec![];
    let mut page_token = None;
    loop {
        let query = ListQuery {
            q: &q,
            fields: "nextPageToken, files(id, name)",
            page_size: PAGE_SIZE,
            page_token,
        };
        let res = client
            .get::<ListResponse, _, _>(FILES_URL, query)
            .await
            .with_context(|| format!("could not list Drive folder {}", folder_id))?;
        trace!("got {} files in page", res.files.len());
        files.extend(res.files);

        match res.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    Ok(files)
}

/// Build a Drive search query for files of `mime_type` in `folder_id`.
fn folder_query(folder_id: &str, mime_type: &str) -> String {
    format!(
        "'{}' in parents and mimeType='{}'",
        escape_query_string(folder_id),
        escape_query_string(mime_type),
    )
}

/// Escape a value for use inside a single-quoted Drive query string.
fn escape_query_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[test]
fn builds_folder_queries() {
    assert_eq!(
        folder_query("1AbC", "text/csv"),
        "'1AbC' in parents and mimeType='text/csv'",
    );
    assert_eq!(
        folder_query("it's", "a\\b"),
        r"'it\'s' in parents and mimeType='a\\b'",
    );
}

#[test]
fn parses_list_responses() {
    let res = serde_json::from_str::<ListResponse>(
        r#"{"nextPageToken": "p2", "files": [{"id": "1", "name": "a.csv"}]}"#,
    )
    .unwrap();
    assert_eq!(res.next_page_token.as_deref(), Some("p2"));
    assert_eq!(res.files, vec![FileRef::new("1", "a.csv")]);

    let res = serde_json::from_str::<ListResponse>("{}").unwrap();
    assert!(res.next_page_token.is_none());
    assert!(res.files.is_empty());
}
