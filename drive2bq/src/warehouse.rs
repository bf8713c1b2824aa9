//! Destination warehouses that accept a full-table overwrite.

use async_trait::async_trait;

use crate::common::*;
use crate::schema::ColumnSchema;

/// A warehouse table which we can replace with the contents of a
/// [`RowBuffer`].
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// A human-readable name for the destination, for logging.
    fn destination(&self) -> String;

    /// Create the destination dataset if it doesn't exist.
    async fn ensure_dataset(&self) -> Result<()>;

    /// Create the destination table using `schema` if it doesn't exist.
    async fn ensure_table(&self, schema: &ColumnSchema) -> Result<()>;

    /// Replace all the rows in the destination table with `buffer`, and wait
    /// for the operation to finish.
    async fn overwrite(
        &self,
        ctx: &Context,
        buffer: &RowBuffer,
        schema: &ColumnSchema,
    ) -> Result<()>;
}

/// Make sure the destination exists, then overwrite it with `buffer`.
///
/// This stops at the first error. Nothing is rolled back, so a failure after
/// creating the dataset or table leaves them in place.
#[instrument(level = "trace", skip_all, fields(dest = %warehouse.destination()))]
pub async fn load_table(
    ctx: &Context,
    warehouse: &dyn Warehouse,
    buffer: &RowBuffer,
    schema: &ColumnSchema,
) -> Result<()> {
    let dest = warehouse.destination();
    warehouse
        .ensure_dataset()
        .await
        .with_context(|| format!("could not prepare dataset for {}", dest))?;
    warehouse
        .ensure_table(schema)
        .await
        .with_context(|| format!("could not prepare table {}", dest))?;
    info!("loading {} rows into {}", buffer.len(), dest);
    warehouse
        .overwrite(ctx, buffer, schema)
        .await
        .with_context(|| format!("could not load data into {}", dest))?;
    info!("loaded {} rows into {}", buffer.len(), dest);
    Ok(())
}
