//! Upload rows from memory into a BigQuery table.

use bytes::BufMut;
use serde::Serialize;
use uuid::Uuid;

use super::{
    super::{percent_encode, Client},
    jobs::{
        wait_for_job, CreateDisposition, Job, JobConfigurationLoad, Labels,
        SourceFormat, TableReference, WriteDisposition,
    },
    non_empty_schema, TableName, TableSchema,
};
use crate::common::*;

/// The endpoint for media uploads.
const UPLOAD_URL: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";

/// URL query parameters for uploads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    upload_type: &'static str,
}

/// Replace the contents of `dest` with `buffer`, and wait for BigQuery to
/// finish.
#[instrument(level = "trace", skip(client, buffer, schema, labels), fields(dest = %dest))]
pub(crate) async fn load(
    client: &Client,
    dest: &TableName,
    buffer: &RowBuffer,
    schema: &TableSchema,
    labels: &Labels,
) -> Result<()> {
    let config = JobConfigurationLoad {
        source_format: Some(SourceFormat::NewlineDelimitedJson),
        schema: non_empty_schema(schema),
        destination_table: TableReference::from(dest),
        create_disposition: Some(CreateDisposition::CreateIfNeeded),
        write_disposition: Some(WriteDisposition::WriteTruncate),
    };
    let job = Job::new_load(config, labels.to_owned());
    let metadata = serde_json::to_vec(&job)?;
    let data = rows_to_ndjson(buffer)?;
    debug!("uploading {} bytes of rows to {}", data.len(), dest);

    let boundary = format!("drive2bq_{}", Uuid::new_v4().simple());
    let body = multipart_related_body(&boundary, &metadata, &data);
    let url = format!("{}/projects/{}/jobs", UPLOAD_URL, percent_encode(dest.project()));
    let job = client
        .post_body::<Job, _, _>(
            &url,
            UploadQuery {
                upload_type: "multipart",
            },
            &format!("multipart/related; boundary={}", boundary),
            body,
        )
        .await
        .context("could not start BigQuery load job")?;
    debug!("started BigQuery job {:?}", job.id);

    wait_for_job(client, job).await?;
    Ok(())
}

/// Serialize every row of `buffer` as one JSON object per line.
pub(crate) fn rows_to_ndjson(buffer: &RowBuffer) -> Result<Bytes> {
    let mut out = BytesMut::new().writer();
    for record in buffer.records() {
        let obj = record
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::to_writer(&mut out, &obj)?;
        out.get_mut().put_u8(b'\n');
    }
    Ok(out.into_inner().freeze())
}

/// Build a `multipart/related` body with JSON job metadata followed by the
/// raw data.
fn multipart_related_body(boundary: &str, metadata: &[u8], data: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + data.len() + 256);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata);
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn rows_become_json_lines() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let buffer = RowBuffer::from_columns(vec![
            (
                "id".to_owned(),
                ColumnType::Integer,
                vec![Value::Integer(1), Value::Null],
            ),
            (
                "quando".to_owned(),
                ColumnType::Timestamp,
                vec![Value::Timestamp(ts), Value::Null],
            ),
            (
                "valor".to_owned(),
                ColumnType::Float,
                vec![Value::Float(2.5), Value::Float(f64::NAN)],
            ),
        ])
        .unwrap();
        let ndjson = rows_to_ndjson(&buffer).unwrap();
        assert_eq!(
            std::str::from_utf8(&ndjson).unwrap(),
            concat!(
                r#"{"id":1,"quando":"2024-01-31 12:00:00","valor":2.5}"#,
                "\n",
                r#"{"id":null,"quando":null,"valor":null}"#,
                "\n",
            ),
        );
    }

    #[test]
    fn empty_buffers_produce_empty_uploads() {
        assert!(rows_to_ndjson(&RowBuffer::default()).unwrap().is_empty());
    }

    #[test]
    fn multipart_body_layout() {
        let body = multipart_related_body("b", b"{}", b"x\n");
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n\
             --b\r\nContent-Type: application/octet-stream\r\n\r\nx\n\r\n--b--\r\n",
        );
    }
}
