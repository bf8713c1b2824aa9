//! Creating BigQuery tables.

use serde::{Deserialize, Serialize};

use super::{
    super::{percent_encode, Client, ClientError, NoQuery},
    jobs::TableReference,
    TableName, TableSchema, BIGQUERY_URL,
};
use crate::common::*;

/// Information needed to create a table.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableNew {
    table_reference: TableReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<TableSchema>,
}

/// Our response type. We don't care about what's in here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {}

/// Create the table `name` with `schema` if it doesn't already exist. An
/// existing table is left alone, since loading will replace its schema anyway.
#[instrument(level = "trace", skip(client, schema), fields(name = %name))]
pub(crate) async fn ensure_table(
    client: &Client,
    name: &TableName,
    schema: &TableSchema,
) -> Result<()> {
    let url = format!(
        "{}/projects/{}/datasets/{}/tables/{}",
        BIGQUERY_URL,
        percent_encode(name.project()),
        percent_encode(name.dataset()),
        percent_encode(name.table()),
    );
    match client.get::<Table, _, _>(&url, NoQuery).await {
        Ok(_) => {
            debug!("table {} already exists", name);
            return Ok(());
        }
        Err(ClientError::NotFound { .. }) => {}
        Err(ClientError::Other(err)) => return Err(err),
    }

    info!("creating table {}", name);
    let insert_url = format!(
        "{}/projects/{}/datasets/{}/tables",
        BIGQUERY_URL,
        percent_encode(name.project()),
        percent_encode(name.dataset()),
    );
    let table = TableNew {
        table_reference: TableReference::from(name),
        schema: non_empty_schema(schema),
    };
    client
        .post::<Table, _, _, _>(&insert_url, NoQuery, table)
        .await
        .with_context(|| format!("could not create table {}", name))?;
    Ok(())
}

/// BigQuery rejects a schema with no fields, so leave it out entirely.
pub(crate) fn non_empty_schema(schema: &TableSchema) -> Option<TableSchema> {
    if schema.fields.is_empty() {
        None
    } else {
        Some(schema.clone())
    }
}

#[test]
fn empty_schemas_are_omitted() {
    let table = TableNew {
        table_reference: TableReference::from(&TableName::new("p", "d", "t")),
        schema: non_empty_schema(&TableSchema { fields: vec![] }),
    };
    assert_eq!(
        serde_json::to_value(&table).unwrap(),
        serde_json::json!({
            "tableReference": {"projectId": "p", "datasetId": "d", "tableId": "t"}
        }),
    );
}
