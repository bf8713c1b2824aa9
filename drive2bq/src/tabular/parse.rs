//! Parsing delimited text into a [`RowBuffer`].

use chrono::{NaiveDate, NaiveDateTime};
use std::{collections::HashMap, fmt, str::FromStr};

use super::{ColumnType, RowBuffer, Value};
use crate::common::*;

/// Cell contents which we treat as missing values.
static MISSING_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Text encodings we know how to decode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// ISO-8859-1. Every byte is a valid character.
    Latin1,
    /// Strict UTF-8.
    Utf8,
}

impl Encoding {
    /// Decode `bytes` into a string.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            // ISO-8859-1 maps each byte to the Unicode code point with the same
            // value.
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Encoding::Utf8 => String::from_utf8(bytes.to_owned())
                .context("file is not valid UTF-8"),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Encoding::Latin1),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            _ => Err(format_err!("unknown text encoding: {:?}", s)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Latin1 => "latin1".fmt(f),
            Encoding::Utf8 => "utf-8".fmt(f),
        }
    }
}

/// How to decode and parse a CSV file.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvOptions {
    /// The text encoding of the file.
    pub encoding: Encoding,
    /// The field delimiter.
    pub delimiter: u8,
    /// `chrono` format strings to try when looking for timestamp columns. If
    /// this is empty, we never infer timestamps.
    pub timestamp_formats: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            encoding: Encoding::Latin1,
            delimiter: b';',
            timestamp_formats: vec![],
        }
    }
}

/// Parse a CSV file with a header row into a [`RowBuffer`], inferring a type
/// for each column.
pub fn parse_csv(bytes: &[u8], opts: &CsvOptions) -> Result<RowBuffer> {
    let text = opts.encoding.decode(bytes)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers().context("could not read CSV header")?.clone();
    if headers.is_empty() {
        return Err(format_err!("no columns to parse from file"));
    }
    let names = header_names(&headers);

    // Collect our cells column by column, so that we can infer types.
    let mut cells: Vec<Vec<Option<String>>> = vec![vec![]; names.len()];
    for result in rdr.records() {
        let record = result.context("could not parse CSV record")?;
        if record.len() > names.len() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(format_err!(
                "expected {} fields in line {}, saw {}",
                names.len(),
                line,
                record.len(),
            ));
        }
        for (idx, column) in cells.iter_mut().enumerate() {
            let cell = record.get(idx).filter(|c| !MISSING_VALUES.contains(c));
            column.push(cell.map(str::to_owned));
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, column)| {
            let (column_type, values) =
                convert_column(column, &opts.timestamp_formats);
            (name, column_type, values)
        })
        .collect::<Vec<_>>();
    RowBuffer::from_columns(columns)
}

/// Clean up header names. Empty names become `"Unnamed: N"`, and repeated
/// names get `.1`, `.2`, etc. appended.
fn header_names(headers: &csv::StringRecord) -> Vec<String> {
    let mut counts = HashMap::<String, usize>::new();
    let mut names = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let mut name = if header.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header.to_owned()
        };
        let mut count = counts.get(&name).copied().unwrap_or(0);
        while count > 0 {
            counts.insert(name.clone(), count + 1);
            name = format!("{}.{}", name, count);
            count = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), count + 1);
        names.push(name);
    }
    names
}

/// Pick the narrowest type that fits every non-null cell in a column, and
/// convert the cells.
fn convert_column(
    cells: Vec<Option<String>>,
    timestamp_formats: &[String],
) -> (ColumnType, Vec<Value>) {
    if cells.iter().all(Option::is_none) {
        let values = vec![Value::Null; cells.len()];
        return (ColumnType::Null, values);
    }
    if let Some(values) = try_convert(&cells, |s| s.parse::<i64>().ok().map(Value::Integer))
    {
        return (ColumnType::Integer, values);
    }
    if let Some(values) = try_convert(&cells, |s| s.parse::<f64>().ok().map(Value::Float))
    {
        return (ColumnType::Float, values);
    }
    if let Some(values) = try_convert(&cells, |s| parse_bool(s).map(Value::Boolean)) {
        return (ColumnType::Boolean, values);
    }
    if !timestamp_formats.is_empty() {
        if let Some(values) = try_convert(&cells, |s| {
            parse_timestamp(s, timestamp_formats).map(Value::Timestamp)
        }) {
            return (ColumnType::Timestamp, values);
        }
    }
    let values = cells
        .into_iter()
        .map(|c| c.map(Value::Text).unwrap_or(Value::Null))
        .collect();
    (ColumnType::Text, values)
}

/// Convert every non-null cell using `f`, or return `None` if any cell can't be
/// converted.
fn try_convert<F>(cells: &[Option<String>], f: F) -> Option<Vec<Value>>
where
    F: Fn(&str) -> Option<Value>,
{
    cells
        .iter()
        .map(|cell| match cell {
            Some(s) => f(s),
            None => Some(Value::Null),
        })
        .collect()
}

/// Parse the usual spellings of booleans.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Try each format in turn. Formats without a time part produce midnight.
fn parse_timestamp(s: &str, formats: &[String]) -> Option<NaiveDateTime> {
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(s: &str) -> RowBuffer {
        parse_csv(s.as_bytes(), &CsvOptions::default()).unwrap()
    }

    fn types(buffer: &RowBuffer) -> Vec<ColumnType> {
        buffer.columns().iter().map(|c| c.column_type).collect()
    }

    #[test]
    fn infers_column_types() {
        let buffer = parse("i;f;b;t;n\n1;1.5;True;abc;\n-2;3;false;4;NA\n");
        assert_eq!(
            types(&buffer),
            vec![
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Boolean,
                ColumnType::Text,
                ColumnType::Null,
            ],
        );
        assert_eq!(buffer.get(1, "f"), Some(&Value::Float(3.0)));
        assert_eq!(buffer.get(1, "t"), Some(&Value::Text("4".to_owned())));
    }

    #[test]
    fn missing_values_do_not_change_column_type() {
        let buffer = parse("a;b\n1;x\n;null\n3;y\n");
        assert_eq!(types(&buffer), vec![ColumnType::Integer, ColumnType::Text]);
        assert_eq!(buffer.get(1, "a"), Some(&Value::Null));
        assert_eq!(buffer.get(1, "b"), Some(&Value::Null));
    }

    #[test]
    fn decodes_latin1() {
        // "Órgão" in ISO-8859-1.
        let bytes = b"\xd3rg\xe3o;Valor\nMEC;10\n";
        let buffer = parse_csv(bytes, &CsvOptions::default()).unwrap();
        assert_eq!(buffer.column_names().collect::<Vec<_>>(), vec!["Órgão", "Valor"]);
    }

    #[test]
    fn utf8_rejects_invalid_bytes() {
        let opts = CsvOptions {
            encoding: Encoding::Utf8,
            ..CsvOptions::default()
        };
        assert!(parse_csv(b"\xd3rg\xe3o\n1\n", &opts).is_err());
    }

    #[test]
    fn pads_short_rows_and_rejects_long_rows() {
        let buffer = parse("a;b;c\n1;2\n");
        assert_eq!(buffer.get(0, "c"), Some(&Value::Null));
        assert!(parse_csv(b"a;b\n1;2;3\n", &CsvOptions::default()).is_err());
    }

    #[test]
    fn rejects_empty_files() {
        assert!(parse_csv(b"", &CsvOptions::default()).is_err());
    }

    #[test]
    fn names_blank_and_duplicate_headers() {
        let buffer = parse(";a;a;a.1\n1;2;3;4\n");
        assert_eq!(
            buffer.column_names().collect::<Vec<_>>(),
            vec!["Unnamed: 0", "a", "a.1", "a.1.1"],
        );
    }

    #[test]
    fn infers_timestamps_only_when_formats_are_configured() {
        let csv = "when\n2024-03-01 10:00:00\n2024-03-02\n";
        assert_eq!(types(&parse(csv)), vec![ColumnType::Text]);

        let opts = CsvOptions {
            timestamp_formats: vec!["%Y-%m-%d %H:%M:%S".to_owned(), "%Y-%m-%d".to_owned()],
            ..CsvOptions::default()
        };
        let buffer = parse_csv(csv.as_bytes(), &opts).unwrap();
        assert_eq!(types(&buffer), vec![ColumnType::Timestamp]);
        assert_eq!(buffer.get(1, "when").unwrap().to_string(), "2024-03-02 00:00:00");
    }

    #[test]
    fn encodings_parse_from_config_strings() {
        assert_eq!("ISO-8859-1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert_eq!("utf8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
