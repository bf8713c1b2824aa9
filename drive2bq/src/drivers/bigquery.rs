//! Writing tables to BigQuery.

use async_trait::async_trait;

use crate::clouds::gcloud::{
    bigquery::{self, Labels, TableName, TableSchema},
    Client,
};
use crate::common::*;
use crate::schema::ColumnSchema;

/// The job label which records which run loaded a table.
const RUN_LABEL: &str = "drive2bq_run";

/// A [`Warehouse`] that writes to one BigQuery table.
#[derive(Clone, Debug)]
pub struct BigQueryWarehouse {
    client: Client,
    table: TableName,
    location: Option<String>,
}

impl BigQueryWarehouse {
    pub(crate) fn new(
        client: Client,
        project: &str,
        dataset: &str,
        table: &str,
        location: Option<String>,
    ) -> Self {
        BigQueryWarehouse {
            client,
            table: TableName::new(project, dataset, table),
            location,
        }
    }
}

/// Labels attached to every job in a run.
fn run_labels(ctx: &Context) -> Labels {
    let mut labels = Labels::new();
    labels.insert(RUN_LABEL.to_owned(), ctx.run_id().to_owned());
    labels
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn destination(&self) -> String {
        self.table.to_string()
    }

    async fn ensure_dataset(&self) -> Result<()> {
        bigquery::ensure_dataset(
            &self.client,
            self.table.project(),
            self.table.dataset(),
            self.location.as_deref(),
        )
        .await
    }

    async fn ensure_table(&self, schema: &ColumnSchema) -> Result<()> {
        bigquery::ensure_table(&self.client, &self.table, &TableSchema::from(schema)).await
    }

    async fn overwrite(
        &self,
        ctx: &Context,
        buffer: &RowBuffer,
        schema: &ColumnSchema,
    ) -> Result<()> {
        bigquery::load(
            &self.client,
            &self.table,
            buffer,
            &TableSchema::from(schema),
            &run_labels(ctx),
        )
        .await
    }
}

#[test]
fn labels_carry_run_id() {
    let ctx = Context::with_run_id("abc123");
    let labels = run_labels(&ctx);
    assert_eq!(labels.get("drive2bq_run").map(String::as_str), Some("abc123"));
}
