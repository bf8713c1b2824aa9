//! Log output.

use std::{io, str::FromStr};
use tracing::Dispatch;
use tracing_subscriber::{fmt::MakeWriter, EnvFilter};

use crate::common::*;

/// The filter we use when `RUST_LOG` isn't set.
const DEFAULT_FILTER: &str = "info";

/// What log format we should use. Both are plain text with a timestamp and a
/// level on every line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogFormat {
    /// One line per event, including span fields.
    Full,
    /// Shorter lines, with span fields at the end.
    Compact,
}

impl LogFormat {
    /// Build a log dispatcher writing to standard output.
    pub fn dispatch(self) -> Dispatch {
        self.dispatch_to(io::stdout)
    }

    /// Build a log dispatcher writing to `writer`.
    ///
    /// The caller decides where this is installed. `main` uses
    /// `tracing::dispatcher::set_default` for the length of the run.
    pub fn dispatch_to<W>(self, writer: W) -> Dispatch
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false);
        match self {
            LogFormat::Full => Dispatch::new(builder.finish()),
            LogFormat::Compact => Dispatch::new(builder.compact().finish()),
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format_err!("unknown log format: {}", s)),
        }
    }
}

#[test]
fn parses_log_formats() {
    assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Full);
    assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    assert!("json".parse::<LogFormat>().is_err());
}
