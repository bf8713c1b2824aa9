//! Per-run logging context.

use tracing::Span;
use uuid::Uuid;

use crate::common::*;

/// Context shared by every stage of a single pipeline run.
///
/// This is passed down explicitly instead of living in global state, so that
/// tests can run several pipelines side by side.
#[derive(Debug, Clone)]
pub struct Context {
    /// A unique ID for this run. Also attached to BigQuery jobs as a label.
    run_id: String,

    /// The span that all of this run's log output happens in.
    span: Span,
}

impl Context {
    /// Create a context for a new run, with a fresh run ID.
    pub fn create() -> Self {
        Self::with_run_id(Uuid::new_v4().simple().to_string())
    }

    /// Create a context with a specific run ID.
    pub fn with_run_id<S: Into<String>>(run_id: S) -> Self {
        let run_id = run_id.into();
        let span = info_span!("run", run_id = %run_id);
        Context { run_id, span }
    }

    /// The ID of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The span for this run.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[test]
fn run_ids_are_unique_label_values() {
    let a = Context::create();
    let b = Context::create();
    assert_ne!(a.run_id(), b.run_id());
    // BigQuery labels only allow lowercase letters, digits, `_` and `-`.
    assert!(a
        .run_id()
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}
