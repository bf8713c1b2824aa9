//! Interfaces to BigQuery.

use serde::{Deserialize, Serialize};
use std::{error, fmt};

use crate::schema::{BqType, ColumnSchema};

mod datasets;
pub(crate) mod jobs;
mod load;
mod tables;

pub(crate) use datasets::*;
pub(crate) use jobs::Labels;
pub(crate) use load::*;
pub(crate) use tables::*;

/// The base URL for BigQuery REST calls.
const BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// A BigQuery error.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BigQueryError {
    /// The reason for this error.
    reason: String,

    /// If present, where this error occurred.
    location: Option<String>,

    /// Internal Google information about this error.
    debug_info: Option<String>,

    /// A human-readable description of this error.
    message: String,
}

impl fmt::Display for BigQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl error::Error for BigQueryError {}

/// The name of a BigQuery table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct TableName {
    project: String,
    dataset: String,
    table: String,
}

impl TableName {
    /// Create a new table name.
    pub(crate) fn new<P, D, T>(project: P, dataset: D, table: T) -> Self
    where
        P: Into<String>,
        D: Into<String>,
        T: Into<String>,
    {
        TableName {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// The project containing this table.
    pub(crate) fn project(&self) -> &str {
        &self.project
    }

    /// The dataset containing this table.
    pub(crate) fn dataset(&self) -> &str {
        &self.dataset
    }

    /// The bare table name.
    pub(crate) fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table)
    }
}

/// A table schema, in the format BigQuery's REST API uses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableSchema {
    /// The fields in the table.
    pub(crate) fields: Vec<BqColumn>,
}

impl From<&ColumnSchema> for TableSchema {
    fn from(schema: &ColumnSchema) -> Self {
        TableSchema {
            fields: schema
                .fields()
                .iter()
                .map(|field| BqColumn {
                    name: field.name.clone(),
                    ty: field.ty,
                    mode: Mode::Nullable,
                })
                .collect(),
        }
    }
}

/// A BigQuery column.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BqColumn {
    /// The name of this column.
    pub(crate) name: String,

    /// The type of this column.
    #[serde(rename = "type")]
    pub(crate) ty: BqType,

    /// The mode of this column. Every column we create may hold nulls.
    pub(crate) mode: Mode,
}

/// A column mode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Mode {
    Nullable,
}
