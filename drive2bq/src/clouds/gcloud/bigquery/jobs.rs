//! BigQuery batch jobs.
//!
//! These use a number of closely-related types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

use super::{
    super::{Client, NoQuery},
    BigQueryError, TableName, TableSchema,
};
use crate::common::*;

/// Key/value pairs. See [JobConfiguration][config].
///
/// [config]: https://cloud.google.com/bigquery/docs/reference/rest/v2/Job#jobconfiguration
pub(crate) type Labels = HashMap<String, String>;

/// How long to wait before polling a job for the first time.
const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The longest we'll wait between polls.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(16);

/// A BigQuery job.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Job {
    /// Output only. The ID of this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,

    /// Output only. A link which can be used to access this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) self_link: Option<String>,

    /// The configuration for this job.
    #[serde(default)]
    pub(crate) configuration: JobConfiguration,

    /// Output only. A reference to this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) job_reference: Option<JobReference>,

    /// Output only. The status of this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<JobStatus>,
}

impl Job {
    /// Create a new load job.
    pub(crate) fn new_load(load_config: JobConfigurationLoad, labels: Labels) -> Self {
        Job {
            id: None,
            self_link: None,
            configuration: JobConfiguration {
                load: Some(load_config),
                labels,
            },
            job_reference: None,
            status: None,
        }
    }

    /// Get a URL which can be used for this job.
    pub(crate) fn url(&self) -> Result<Url> {
        self.self_link
            .as_ref()
            .ok_or_else(|| format_err!("newly created job has no selfLink"))?
            .parse::<Url>()
            .context("BigQuery returned invalid selfLink")
    }

    /// The current state of this job, if BigQuery told us.
    fn state(&self) -> Option<JobState> {
        self.status.as_ref().map(|s| s.state)
    }
}

/// A compound job ID containing project and region information.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    /// The project containing this job.
    pub(crate) project_id: String,

    /// The bare ID, suitable for use in URL.
    pub(crate) job_id: String,

    /// The location of this job.
    pub(crate) location: Option<String>,
}

/// Configuration for a job.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobConfiguration {
    /// Configuration information load jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) load: Option<JobConfigurationLoad>,

    /// Labels to attach to jobs.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub(crate) labels: Labels,
}

/// Configuration for data load jobs.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobConfigurationLoad {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) source_format: Option<SourceFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) schema: Option<TableSchema>,
    pub(crate) destination_table: TableReference,
    pub(crate) create_disposition: Option<CreateDisposition>,
    pub(crate) write_disposition: Option<WriteDisposition>,
}

/// The format of the data we upload.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum SourceFormat {
    NewlineDelimitedJson,
}

/// The status of a job.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatus {
    /// The state of this job.
    state: JobState,

    /// If present, indicates that the job failed.
    error_result: Option<BigQueryError>,

    /// Errors encountered while running the job. These do not necessarily
    /// indicate that the job has finished or was unsuccessful.
    #[serde(default)]
    errors: Vec<BigQueryError>,
}

impl JobStatus {
    /// Check to see if we've encountered an error.
    fn check_for_error(&self) -> Result<(), BigQueryError> {
        if let Some(err) = &self.error_result {
            Err(err.clone())
        } else {
            Ok(())
        }
    }
}

/// The state of a job.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum JobState {
    /// This job is waiting to run.
    Pending,
    /// This job is currently running.
    Running,
    /// This job has finished.
    Done,
}

/// The name of a table.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableReference {
    pub(crate) project_id: String,
    pub(crate) dataset_id: String,
    pub(crate) table_id: String,
}

impl From<&TableName> for TableReference {
    fn from(name: &TableName) -> Self {
        Self {
            project_id: name.project().to_owned(),
            dataset_id: name.dataset().to_owned(),
            table_id: name.table().to_owned(),
        }
    }
}

/// Should this job create new tables?
#[derive(Clone, Copy, Debug, Deserialize, Eq, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum CreateDisposition {
    CreateIfNeeded,
}

/// What should this job do with existing rows? We always replace them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum WriteDisposition {
    WriteTruncate,
}

/// Poll a newly-created `job` until it finishes, and return an error if it
/// failed.
#[instrument(level = "trace", skip(client, job), fields(id = ?job.id))]
pub(crate) async fn wait_for_job(client: &Client, mut job: Job) -> Result<Job> {
    // Get the URL for polling the job.
    let job_url = job.url()?;

    let mut sleep_duration = INITIAL_POLL_INTERVAL;
    while job.state() != Some(JobState::Done) {
        trace!("job {:?} is {:?}", job.id, job.state());
        sleep(sleep_duration).await;
        sleep_duration = next_poll_interval(sleep_duration);

        job = client
            .get::<Job, _, _>(job_url.as_str(), NoQuery)
            .await
            .context("could not check BigQuery job status")?;
    }

    // Return either an error or a finished job.
    if let Some(status) = &job.status {
        status.check_for_error()?;
        for err in &status.errors {
            debug!("BigQuery job reported: {}", err);
        }
    }
    Ok(job)
}

/// Double our wait time, up to a limit.
fn next_poll_interval(current: Duration) -> Duration {
    (current * 2).min(MAX_POLL_INTERVAL)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn poll_interval_doubles_up_to_limit() {
        let mut d = INITIAL_POLL_INTERVAL;
        let mut seen = vec![];
        for _ in 0..5 {
            seen.push(d.as_secs());
            d = next_poll_interval(d);
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 16]);
    }

    #[test]
    fn load_job_json() {
        let mut labels = Labels::new();
        labels.insert("drive2bq_run".to_owned(), "abc".to_owned());
        let job = Job::new_load(
            JobConfigurationLoad {
                source_format: Some(SourceFormat::NewlineDelimitedJson),
                schema: None,
                destination_table: TableReference::from(&TableName::new("p", "d", "t")),
                create_disposition: Some(CreateDisposition::CreateIfNeeded),
                write_disposition: Some(WriteDisposition::WriteTruncate),
            },
            labels,
        );
        assert_eq!(
            serde_json::to_value(&job).unwrap(),
            serde_json::json!({
                "configuration": {
                    "load": {
                        "sourceFormat": "NEWLINE_DELIMITED_JSON",
                        "destinationTable": {
                            "projectId": "p",
                            "datasetId": "d",
                            "tableId": "t",
                        },
                        "createDisposition": "CREATE_IF_NEEDED",
                        "writeDisposition": "WRITE_TRUNCATE",
                    },
                    "labels": {"drive2bq_run": "abc"},
                }
            }),
        );
    }

    #[test]
    fn failed_jobs_report_errors() {
        let job = serde_json::from_str::<Job>(
            r#"{
                "id": "p:US.job1",
                "selfLink": "https://bigquery.googleapis.com/bigquery/v2/projects/p/jobs/job1?location=US",
                "configuration": {},
                "jobReference": {"projectId": "p", "jobId": "job1", "location": "US"},
                "status": {
                    "state": "DONE",
                    "errorResult": {"reason": "invalid", "message": "bad row"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(job.state(), Some(JobState::Done));
        assert!(job.url().is_ok());
        let err = job.status.as_ref().unwrap().check_for_error().unwrap_err();
        assert_eq!(err.to_string(), "invalid: bad row");
    }
}
