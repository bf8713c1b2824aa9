//! Configuration file support.
use std::{
    env, fmt,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};
use toml_edit::{DocumentMut, Item};

use crate::common::*;
use crate::tabular::Encoding;

/// Default MIME type of the files we load.
pub const DEFAULT_MIME_TYPE: &str = "text/csv";

/// Default destination dataset.
pub const DEFAULT_DATASET: &str = "gold";

/// Default destination table.
pub const DEFAULT_TABLE: &str = "despesas_governo_nacional";

/// Find the path to our configuration directory.
pub fn config_dir() -> Result<PathBuf> {
    // Use `var_os` instead of `var`, because if it returns a non-Unicode path,
    // we can hand it off directly to `PathBuf`.
    match env::var_os("DRIVE2BQ_CONFIG_DIR") {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(dirs::config_dir()
            // AFAIK, this only fails under weird conditions, such as no home
            // directory.
            .ok_or_else(|| format_err!("could not find user config dir"))?
            .join("drive2bq")),
    }
}

/// Find the path to our configuration file.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("drive2bq.toml"))
}

/// A configuration file key, such as `bigquery.dataset`.
#[derive(Clone, Copy, Debug)]
pub struct Key<'a> {
    /// The TOML table containing this key.
    section: &'a str,
    /// The key in the TOML table.
    key: &'a str,
}

impl<'a> Key<'a> {
    /// A key inside the table `[section]`.
    pub const fn new(section: &'a str, key: &'a str) -> Key<'a> {
        Key { section, key }
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.key)
    }
}

const FOLDER_ID: Key<'static> = Key::new("drive", "folder_id");
const MIME_TYPE: Key<'static> = Key::new("drive", "mime_type");
const ENCODING: Key<'static> = Key::new("csv", "encoding");
const DELIMITER: Key<'static> = Key::new("csv", "delimiter");
const TIMESTAMP_FORMATS: Key<'static> = Key::new("csv", "timestamp_formats");
const PROJECT: Key<'static> = Key::new("bigquery", "project");
const DATASET: Key<'static> = Key::new("bigquery", "dataset");
const TABLE: Key<'static> = Key::new("bigquery", "table");
const LOCATION: Key<'static> = Key::new("bigquery", "location");
const SERVICE_ACCOUNT_KEY_PATH: Key<'static> =
    Key::new("credentials", "service_account_key_path");

/// Our `drive2bq.toml` configuration file.
#[derive(Debug)]
pub struct Configuration {
    /// The path from which we read this file.
    path: PathBuf,
    /// Our raw configuration data.
    doc: DocumentMut,
}

impl Configuration {
    /// Load our default configuration.
    pub fn try_default() -> Result<Self> {
        Self::from_path(&config_file()?)
    }

    /// Load the configuration file at `path`. A missing file is treated as an
    /// empty configuration.
    pub fn from_path(path: &Path) -> Result<Self> {
        match File::open(path) {
            Ok(rdr) => Ok(Self::from_reader(path.to_owned(), rdr)
                .with_context(|| format!("could not read file {}", path.display()))?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self {
                path: path.to_owned(),
                doc: DocumentMut::default(),
            }),
            Err(err) => {
                Err(err).context(format!("could not open file {}", path.display()))
            }
        }
    }

    /// Load a configuration file from the specified reader.
    fn from_reader<R>(path: PathBuf, mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut buf = String::new();
        rdr.read_to_string(&mut buf)?;
        let doc = buf.parse::<DocumentMut>()?;
        Ok(Self { path, doc })
    }

    /// The path we loaded this configuration from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the raw item for `key`.
    fn item(&self, key: &Key<'_>) -> Result<Option<&Item>> {
        match self.doc.as_table().get(key.section) {
            None => Ok(None),
            Some(section) => match section.as_table_like() {
                Some(table) => Ok(table.get(key.key)),
                None => Err(format_err!(
                    "expected [{}] to be a table in {}",
                    key.section,
                    self.path.display(),
                )),
            },
        }
    }

    /// Get an optional string from our config file.
    fn string(&self, key: &Key<'_>) -> Result<Option<String>> {
        match self.item(key)? {
            None => Ok(None),
            Some(item) => match item.as_str() {
                Some(s) => Ok(Some(s.to_owned())),
                None => Err(format_err!(
                    "expected string for {}, found {:?} in {}",
                    key,
                    item.to_string().trim(),
                    self.path.display(),
                )),
            },
        }
    }

    /// Get an array of strings from our config file.
    fn string_array(&self, key: &Key<'_>) -> Result<Vec<String>> {
        let mut values = vec![];
        if let Some(raw_value) = self.item(key)? {
            if let Some(raw_array) = raw_value.as_array() {
                for raw_item in raw_array.iter() {
                    if let Some(s) = raw_item.as_str() {
                        values.push(s.to_owned());
                    } else {
                        return Err(format_err!(
                            "expected string, found {:?} in {} in {}",
                            raw_item.to_string().trim(),
                            key,
                            self.path.display(),
                        ));
                    }
                }
            } else {
                return Err(format_err!(
                    "expected array for {}, found {:?} in {}",
                    key,
                    raw_value.to_string().trim(),
                    self.path.display(),
                ));
            }
        }
        Ok(values)
    }
}

/// Values from the command line which take precedence over the configuration
/// file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub folder_id: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

/// Everything we need to know to run the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// The Drive folder to read from.
    pub folder_id: String,
    /// Only files with this MIME type are loaded.
    pub mime_type: String,
    /// How to parse each file.
    pub csv: CsvOptions,
    /// The BigQuery project. Defaults to the service account's project.
    pub project: Option<String>,
    /// The destination dataset.
    pub dataset: String,
    /// The destination table.
    pub table: String,
    /// Where to create the dataset, if we need to.
    pub location: Option<String>,
    /// Where to find the service account key, if it isn't in the environment.
    pub service_account_key_path: Option<PathBuf>,
}

impl Settings {
    /// Resolve our settings from `config`, applying `overrides`.
    pub fn from_config(config: &Configuration, overrides: &Overrides) -> Result<Self> {
        let folder_id = string_with_override(config, &overrides.folder_id, &FOLDER_ID)?
            .ok_or_else(|| {
                format_err!(
                    "no Drive folder configured: set {} in {} or pass --folder-id",
                    FOLDER_ID,
                    config.path().display(),
                )
            })?;

        let mut csv = CsvOptions::default();
        if let Some(encoding) = config.string(&ENCODING)? {
            csv.encoding = encoding
                .parse::<Encoding>()
                .with_context(|| format!("invalid {}", ENCODING))?;
        }
        if let Some(delimiter) = config.string(&DELIMITER)? {
            csv.delimiter = parse_delimiter(&delimiter)
                .with_context(|| format!("invalid {}", DELIMITER))?;
        }
        csv.timestamp_formats = config.string_array(&TIMESTAMP_FORMATS)?;

        Ok(Settings {
            folder_id,
            mime_type: config
                .string(&MIME_TYPE)?
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
            csv,
            project: config.string(&PROJECT)?,
            dataset: string_with_override(config, &overrides.dataset, &DATASET)?
                .unwrap_or_else(|| DEFAULT_DATASET.to_owned()),
            table: string_with_override(config, &overrides.table, &TABLE)?
                .unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
            location: config.string(&LOCATION)?,
            service_account_key_path: config
                .string(&SERVICE_ACCOUNT_KEY_PATH)?
                .map(PathBuf::from),
        })
    }
}

/// Use `value` if we have one, or look up `key` otherwise.
fn string_with_override(
    config: &Configuration,
    value: &Option<String>,
    key: &Key<'_>,
) -> Result<Option<String>> {
    match value {
        Some(value) => Ok(Some(value.clone())),
        None => config.string(key),
    }
}

/// Parse a single-byte delimiter. We accept `"\t"` as a tab.
fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "\\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format_err!("delimiter must be a single ASCII character, found {:?}", s)),
    }
}
