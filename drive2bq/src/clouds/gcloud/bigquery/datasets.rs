//! Creating BigQuery datasets.

use serde::{Deserialize, Serialize};

use super::{
    super::{percent_encode, Client, ClientError, NoQuery},
    BIGQUERY_URL,
};
use crate::common::*;

/// The name of a dataset.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    project_id: String,
    dataset_id: String,
}

/// A dataset, as sent to and returned by the REST API. We only care about a
/// few fields.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    dataset_reference: DatasetReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// Create `project.dataset` if it doesn't already exist.
#[instrument(level = "trace", skip(client))]
pub(crate) async fn ensure_dataset(
    client: &Client,
    project: &str,
    dataset: &str,
    location: Option<&str>,
) -> Result<()> {
    let url = format!(
        "{}/projects/{}/datasets/{}",
        BIGQUERY_URL,
        percent_encode(project),
        percent_encode(dataset),
    );
    match client.get::<Dataset, _, _>(&url, NoQuery).await {
        Ok(existing) => {
            debug!(
                "dataset {}:{} already exists in {:?}",
                project, dataset, existing.location,
            );
            return Ok(());
        }
        Err(ClientError::NotFound { .. }) => {}
        Err(ClientError::Other(err)) => return Err(err),
    }

    info!("creating dataset {}:{}", project, dataset);
    let insert_url = format!("{}/projects/{}/datasets", BIGQUERY_URL, percent_encode(project));
    let body = Dataset {
        dataset_reference: DatasetReference {
            project_id: project.to_owned(),
            dataset_id: dataset.to_owned(),
        },
        location: location.map(|l| l.to_owned()),
    };
    client
        .post::<Dataset, _, _, _>(&insert_url, NoQuery, body)
        .await
        .with_context(|| format!("could not create dataset {}:{}", project, dataset))?;
    Ok(())
}

#[test]
fn dataset_json_omits_missing_location() {
    let body = Dataset {
        dataset_reference: DatasetReference {
            project_id: "p".to_owned(),
            dataset_id: "gold".to_owned(),
        },
        location: None,
    };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        serde_json::json!({"datasetReference": {"projectId": "p", "datasetId": "gold"}}),
    );
}
