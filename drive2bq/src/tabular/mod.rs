//! In-memory tables built from delimited text.

mod parse;
mod row_buffer;
mod value;

pub use self::parse::{parse_csv, CsvOptions, Encoding};
pub use self::row_buffer::{BufferColumn, Record, RowBuffer};
pub use self::value::{ColumnType, Value};
