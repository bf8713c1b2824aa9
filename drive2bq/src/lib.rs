//! Load CSV files from a Google Drive folder into a BigQuery table.
//!
//! The interesting entry point is [`pipeline::run`], which lists a Drive
//! folder, downloads and concatenates every CSV file it finds, cleans up the
//! column names, infers a BigQuery schema and overwrites the destination table.
//! The remote services sit behind the [`FileStorage`] and [`Warehouse`] traits.

#![warn(rust_2018_idioms, unused_extern_crates, clippy::all)]

pub(crate) mod clouds;
pub mod config;
pub mod context;
pub(crate) mod credentials;
pub mod drivers;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod schema;
pub mod storage;
pub mod tabular;
#[cfg(test)]
pub(crate) mod test_util;
pub(crate) mod tls;
pub mod warehouse;

pub use anyhow::{Error, Result};
pub use context::Context;
pub use storage::{FileRef, FileStorage};
pub use warehouse::Warehouse;

/// Definitions included by all the files in this crate.
///
/// This forms the dialect of Rust we use for implementing the pipeline, with an
/// emphasis on `tokio` and `tracing`.
#[allow(unused_imports)]
pub(crate) mod common {
    pub(crate) use anyhow::{format_err, Context as _, Error, Result};
    pub(crate) use bytes::{Bytes, BytesMut};
    pub(crate) use futures::{Future, FutureExt, StreamExt};
    pub(crate) use tracing::{
        debug, debug_span, error, info, info_span, instrument, trace, warn,
        Instrument,
    };
    pub(crate) use url::Url;

    pub(crate) use crate::{
        context::Context,
        storage::{FileRef, FileStorage},
        tabular::{ColumnType, CsvOptions, RowBuffer, Value},
        warehouse::Warehouse,
    };
}
