//! Support for looking up the service account key.

use async_trait::async_trait;
use std::{env, fmt, io, path::PathBuf};
use tokio::fs;

use crate::common::*;
use crate::config::{config_dir, Settings};

/// The environment variable which may contain a service account key.
const SERVICE_ACCOUNT_KEY_VAR: &str = "DRIVE2BQ_SERVICE_ACCOUNT_KEY";

/// The name of the key file we look for in our config directory.
const SERVICE_ACCOUNT_KEY_FILE: &str = "gcloud_service_account_key.json";

/// A credential we found, along with a description of where it came from.
#[derive(Clone)]
pub(crate) struct Credentials {
    value: String,
    source: String,
}

impl Credentials {
    /// The raw credential.
    pub(crate) fn value(&self) -> &str {
        &self.value
    }

    /// Where we found this credential.
    pub(crate) fn source(&self) -> &str {
        &self.source
    }
}

// Never print the secret itself.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// An interface for looking up credentials.
#[async_trait]
trait CredentialsSource: fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Look up an appropriate set of credentials.
    async fn get_credentials(&self) -> Result<Option<Credentials>>;
}

/// Extra methods for `CredentialsSource` which aren't "object safe".
trait CredentialsSourceExt: CredentialsSource + Sized + 'static {
    /// Convert to a `Box<dyn CredentialsSource>`.
    fn boxed(self) -> Box<dyn CredentialsSource> {
        Box::new(self)
    }
}

impl<CS: CredentialsSource> CredentialsSourceExt for CS {}

/// Look up credentials stored in an environment variable.
#[derive(Debug)]
struct EnvCredentialsSource {
    var: String,
}

impl EnvCredentialsSource {
    fn new<S: Into<String>>(var: S) -> Self {
        Self { var: var.into() }
    }
}

impl fmt::Display for EnvCredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- The environment variable {}", self.var)
    }
}

#[async_trait]
impl CredentialsSource for EnvCredentialsSource {
    async fn get_credentials(&self) -> Result<Option<Credentials>> {
        match env::var(&self.var) {
            Ok(value) => Ok(Some(Credentials {
                value,
                source: format!("environment variable {}", self.var),
            })),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(..)) => Err(format_err!(
                "environment variable {} cannot be converted to UTF-8",
                self.var,
            )),
        }
    }
}

/// Load credentials stored in a file.
#[derive(Debug)]
struct FileCredentialsSource {
    path: PathBuf,
}

impl FileCredentialsSource {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl fmt::Display for FileCredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- The file {}", self.path.display())
    }
}

#[async_trait]
impl CredentialsSource for FileCredentialsSource {
    async fn get_credentials(&self) -> Result<Option<Credentials>> {
        match fs::read_to_string(&self.path).await {
            Ok(value) => Ok(Some(Credentials {
                value,
                source: format!("file {}", self.path.display()),
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(format_err!(
                "error reading {}: {}",
                self.path.display(),
                err,
            )),
        }
    }
}

/// Look in multiple places for credentials.
#[derive(Debug)]
struct CredentialsSources {
    sources: Vec<Box<dyn CredentialsSource>>,
}

impl fmt::Display for CredentialsSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.sources {
            write!(f, "{}", s)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialsSource for CredentialsSources {
    async fn get_credentials(&self) -> Result<Option<Credentials>> {
        for source in &self.sources {
            if let Some(credentials) = source.get_credentials().await? {
                return Ok(Some(credentials));
            }
        }
        Ok(None)
    }
}

/// The places we look for a service account key, in order.
fn service_account_key_sources(settings: &Settings) -> Result<CredentialsSources> {
    let mut sources = vec![EnvCredentialsSource::new(SERVICE_ACCOUNT_KEY_VAR).boxed()];
    if let Some(path) = &settings.service_account_key_path {
        sources.push(FileCredentialsSource::new(path.clone()).boxed());
    }
    sources.push(
        FileCredentialsSource::new(config_dir()?.join(SERVICE_ACCOUNT_KEY_FILE)).boxed(),
    );
    Ok(CredentialsSources { sources })
}

/// Find the service account key we should use.
pub(crate) async fn service_account_key(settings: &Settings) -> Result<Credentials> {
    let sources = service_account_key_sources(settings)?;
    match sources.get_credentials().await? {
        Some(creds) => {
            debug!("using service account key from {}", creds.source());
            Ok(creds)
        }
        // Explain to the user how they could have specified this credential.
        None => Err(format_err!(
            "could not find a Google Cloud service account key in any of:\n{}",
            sources,
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn file_source_reads_and_tolerates_missing_files() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"{\"type\": \"service_account\"}").unwrap();
        temp.flush().unwrap();

        let source = FileCredentialsSource::new(temp.path().to_owned());
        let creds = source.get_credentials().await.unwrap().unwrap();
        assert_eq!(creds.value(), "{\"type\": \"service_account\"}");
        assert!(creds.source().starts_with("file "));

        let dir = tempfile::tempdir().unwrap();
        let missing = FileCredentialsSource::new(dir.path().join("missing.json"));
        assert!(missing.get_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sources_are_searched_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&second, "second").unwrap();

        let sources = CredentialsSources {
            sources: vec![
                FileCredentialsSource::new(first.clone()).boxed(),
                FileCredentialsSource::new(second).boxed(),
            ],
        };
        let creds = sources.get_credentials().await.unwrap().unwrap();
        assert_eq!(creds.value(), "second");

        std::fs::write(&first, "first").unwrap();
        let creds = sources.get_credentials().await.unwrap().unwrap();
        assert_eq!(creds.value(), "first");
        assert!(sources.to_string().contains("first.json"));
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = Credentials {
            value: "super secret".to_owned(),
            source: "test".to_owned(),
        };
        assert!(!format!("{:?}", creds).contains("super secret"));
    }
}
