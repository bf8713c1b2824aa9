//! Inferring a BigQuery schema from a [`RowBuffer`].

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::*;

/// The BigQuery column types we produce.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BqType {
    Integer,
    Float,
    Timestamp,
    Boolean,
    String,
}

impl From<ColumnType> for BqType {
    fn from(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Integer => BqType::Integer,
            ColumnType::Float => BqType::Float,
            ColumnType::Timestamp => BqType::Timestamp,
            ColumnType::Boolean => BqType::Boolean,
            // Text, and columns where we never saw a value.
            ColumnType::Text | ColumnType::Null => BqType::String,
        }
    }
}

impl fmt::Display for BqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BqType::Integer => "INTEGER",
            BqType::Float => "FLOAT",
            BqType::Timestamp => "TIMESTAMP",
            BqType::Boolean => "BOOLEAN",
            BqType::String => "STRING",
        };
        name.fmt(f)
    }
}

/// A single column in a [`ColumnSchema`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub ty: BqType,
}

/// The warehouse schema for a [`RowBuffer`], one field per column, in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnSchema {
    fields: Vec<SchemaField>,
}

impl ColumnSchema {
    /// Infer a schema from the column types of `buffer`.
    pub fn infer(buffer: &RowBuffer) -> ColumnSchema {
        let fields = buffer
            .columns()
            .iter()
            .map(|col| SchemaField {
                name: col.name.clone(),
                ty: BqType::from(col.column_type),
            })
            .collect();
        ColumnSchema { fields }
    }

    /// Our fields, in order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Do we have any fields at all?
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ColumnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .fields
            .iter()
            .map(|field| format!("{} {}", field.name, field.ty))
            .join(", ");
        fields.fmt(f)
    }
}
