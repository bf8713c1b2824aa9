//! The end-to-end run: list, fetch, sanitize, infer a schema and load.

use itertools::Itertools;
use std::fmt;

use crate::common::*;
use crate::config::Settings;
use crate::fetch::fetch_and_concat;
use crate::sanitize::sanitize_buffer;
use crate::schema::ColumnSchema;
use crate::warehouse::load_table;

/// How many rows of the buffer to include in the log preview.
const PREVIEW_ROWS: usize = 5;

/// What to read, and how to parse it.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// The Drive folder to read from.
    pub folder_id: String,
    /// Only files with this MIME type are read.
    pub mime_type: String,
    /// How to parse each file.
    pub csv: CsvOptions,
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        PipelineOptions {
            folder_id: settings.folder_id.clone(),
            mime_type: settings.mime_type.clone(),
            csv: settings.csv.clone(),
        }
    }
}

/// The stages of a run. A run moves forward through these and never goes
/// back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    List,
    Fetch,
    Sanitize,
    InferSchema,
    Load,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::List => "list",
            RunState::Fetch => "fetch",
            RunState::Sanitize => "sanitize",
            RunState::InferSchema => "infer schema",
            RunState::Load => "load",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        name.fmt(f)
    }
}

/// What happened during a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    /// Either `Done` or `Failed`.
    pub state: RunState,
    /// The stage we were in when we failed.
    pub failed_stage: Option<RunState>,
    pub files_listed: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    /// Rows handed to the warehouse.
    pub rows: usize,
}

impl RunReport {
    fn new() -> Self {
        RunReport {
            state: RunState::List,
            failed_stage: None,
            files_listed: 0,
            files_loaded: 0,
            files_skipped: 0,
            rows: 0,
        }
    }

    /// Did the run finish successfully?
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }
}

/// Run the whole pipeline once.
///
/// Per-file problems are logged and skipped. Anything else stops the run,
/// gets logged here, and is reported as [`RunState::Failed`].
pub async fn run(
    ctx: &Context,
    storage: &dyn FileStorage,
    warehouse: &dyn Warehouse,
    opts: &PipelineOptions,
) -> RunReport {
    let span = ctx.span().clone();
    async move {
        let mut report = RunReport::new();
        match run_stages(ctx, storage, warehouse, opts, &mut report).await {
            Ok(()) => {
                report.state = RunState::Done;
                info!(
                    "finished: {} files listed, {} loaded, {} skipped, {} rows",
                    report.files_listed,
                    report.files_loaded,
                    report.files_skipped,
                    report.rows,
                );
            }
            Err(err) => {
                error!("failed during {} stage: {:#}", report.state, err);
                report.failed_stage = Some(report.state);
                report.state = RunState::Failed;
            }
        }
        report
    }
    .instrument(span)
    .await
}

/// Run each stage in turn, keeping `report.state` pointed at the current one.
async fn run_stages(
    ctx: &Context,
    storage: &dyn FileStorage,
    warehouse: &dyn Warehouse,
    opts: &PipelineOptions,
    report: &mut RunReport,
) -> Result<()> {
    report.state = RunState::List;
    let files = storage
        .list_files(&opts.folder_id, &opts.mime_type)
        .await
        .with_context(|| format!("could not list files in folder {}", opts.folder_id))?;
    report.files_listed = files.len();
    if files.is_empty() {
        info!("no files found");
    } else {
        info!("found {} files", files.len());
        for file in &files {
            info!("{}", file);
        }
    }

    report.state = RunState::Fetch;
    let outcome = fetch_and_concat(storage, &files, &opts.csv).await;
    report.files_loaded = outcome.loaded;
    report.files_skipped = outcome.skipped;
    let mut buffer = outcome.buffer;

    report.state = RunState::Sanitize;
    sanitize_buffer(&mut buffer);
    info!("columns: {}", buffer.column_names().join(", "));
    info!("first rows:\n{}", buffer.preview(PREVIEW_ROWS));

    report.state = RunState::InferSchema;
    let schema = ColumnSchema::infer(&buffer);
    info!("schema: {}", schema);

    report.state = RunState::Load;
    report.rows = buffer.len();
    load_table(ctx, warehouse, &buffer, &schema).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::logging::LogFormat;
    use crate::schema::BqType;
    use crate::test_util::{CapturedLogs, MemoryStorage, RecordingWarehouse};

    fn options() -> PipelineOptions {
        PipelineOptions {
            folder_id: "folder".to_owned(),
            mime_type: "text/csv".to_owned(),
            csv: CsvOptions::default(),
        }
    }

    #[tokio::test]
    async fn empty_folder_still_loads() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let dispatch = LogFormat::Full.dispatch_to(move || writer.clone());
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let ctx = Context::with_run_id("test");
        let storage = MemoryStorage::default();
        let warehouse = RecordingWarehouse::default();
        let report = run(&ctx, &storage, &warehouse, &options()).await;

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.files_listed, 0);
        assert_eq!(report.rows, 0);
        assert_eq!(
            warehouse.calls(),
            vec!["ensure_dataset", "ensure_table", "overwrite"],
        );
        let (buffer, schema) = warehouse.loaded().unwrap();
        assert!(buffer.is_empty());
        assert!(schema.is_empty());
        assert!(logs.contents().contains("no files found"));
    }

    #[tokio::test]
    async fn failed_download_is_skipped() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let dispatch = LogFormat::Full.dispatch_to(move || writer.clone());
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let ctx = Context::with_run_id("test");
        let storage = MemoryStorage::default()
            .with_file("1", "jan.csv", b"Valor (R$);Descricao\n10;a\n20;b\n")
            .with_broken_file("2", "feb.csv")
            .with_file("3", "mar.csv", b"Valor (R$);Descricao\n30;c\n");
        let warehouse = RecordingWarehouse::default();
        let report = run(&ctx, &storage, &warehouse, &options()).await;

        assert_eq!(
            report,
            RunReport {
                state: RunState::Done,
                failed_stage: None,
                files_listed: 3,
                files_loaded: 2,
                files_skipped: 1,
                rows: 3,
            },
        );
        let (buffer, schema) = warehouse.loaded().unwrap();
        assert_eq!(
            buffer.column_names().collect::<Vec<_>>(),
            vec!["valor_rs", "descricao"],
        );
        assert_eq!(schema.fields()[0].ty, BqType::Integer);
        assert_eq!(schema.fields()[1].ty, BqType::String);

        let line = logs.line_containing("skipping feb.csv (2)").unwrap();
        assert!(line.contains("ERROR"), "unexpected log line: {}", line);
    }

    #[tokio::test]
    async fn load_failure_fails_run() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let dispatch = LogFormat::Full.dispatch_to(move || writer.clone());
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let ctx = Context::with_run_id("test");
        let storage = MemoryStorage::default().with_file("1", "a.csv", b"a;b\n1;2\n");
        let warehouse = RecordingWarehouse::failing();
        let report = run(&ctx, &storage, &warehouse, &options()).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failed_stage, Some(RunState::Load));
        assert!(!report.succeeded());

        let line = logs.line_containing("failed during load stage").unwrap();
        assert!(line.contains("ERROR"), "unexpected log line: {}", line);
    }

    #[tokio::test]
    async fn listing_failure_fails_run() {
        let ctx = Context::with_run_id("test");
        let storage = MemoryStorage::default().with_failed_listing();
        let warehouse = RecordingWarehouse::default();
        let report = run(&ctx, &storage, &warehouse, &options()).await;

        assert_eq!(report.failed_stage, Some(RunState::List));
        assert!(warehouse.calls().is_empty());
    }

    #[tokio::test]
    async fn columns_are_aligned_by_name() {
        let ctx = Context::with_run_id("test");
        let storage = MemoryStorage::default()
            .with_file("1", "a.csv", b"id;nome\n1;ana\n")
            .with_file("2", "b.csv", b"nome;id\nbruno;2\n");
        let warehouse = RecordingWarehouse::default();
        let report = run(&ctx, &storage, &warehouse, &options()).await;
        assert!(report.succeeded());

        let (buffer, _) = warehouse.loaded().unwrap();
        assert_eq!(buffer.column_names().collect::<Vec<_>>(), vec!["id", "nome"]);
        assert_eq!(buffer.get(1, "id"), Some(&Value::Integer(2)));
        assert_eq!(buffer.get(1, "nome"), Some(&Value::Text("bruno".to_owned())));
    }
}
