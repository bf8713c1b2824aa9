//! Concrete implementations of [`FileStorage`] and [`Warehouse`] backed by
//! Google Cloud.

use crate::clouds::gcloud::{auth::Authenticator, Client};
use crate::common::*;
use crate::config::Settings;
use crate::credentials::service_account_key;

mod bigquery;
mod drive;

pub use bigquery::BigQueryWarehouse;
pub use drive::DriveStorage;

/// Authenticate using our configured service account, and build a Drive
/// source and a BigQuery destination which share one HTTP client.
#[instrument(level = "debug", skip_all)]
pub async fn connect(settings: &Settings) -> Result<(DriveStorage, BigQueryWarehouse)> {
    let key = service_account_key(settings).await?;
    let authenticator = Authenticator::from_service_account_key(key.value())
        .with_context(|| format!("invalid service account key in {}", key.source()))?;
    let client = Client::new(authenticator)?;

    let project = match &settings.project {
        Some(project) => project.clone(),
        None => client
            .authenticator()
            .project_id()
            .ok_or_else(|| {
                format_err!(
                    "no BigQuery project configured, and the service account key has no project_id"
                )
            })?
            .to_owned(),
    };

    let storage = DriveStorage::new(client.clone());
    let warehouse = BigQueryWarehouse::new(
        client,
        &project,
        &settings.dataset,
        &settings.table,
        settings.location.clone(),
    );
    Ok((storage, warehouse))
}
