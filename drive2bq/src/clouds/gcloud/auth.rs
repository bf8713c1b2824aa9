//! Authentication support for Google Cloud.

use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::{fmt, sync::Arc};

use crate::common::*;

/// An OAuth2 access token.
pub(crate) type AccessToken = Arc<gcp_auth::Token>;

/// The fields of a service account key that we read ourselves. `gcp_auth`
/// handles the rest.
#[derive(Deserialize)]
struct ServiceAccountKeyInfo {
    #[serde(rename = "type")]
    key_type: Option<String>,
    project_id: Option<String>,
    client_email: Option<String>,
}

/// Something which can hand out OAuth2 tokens for a service account.
#[derive(Clone)]
pub(crate) struct Authenticator {
    /// The underlying token source.
    service_account: Arc<CustomServiceAccount>,

    /// The project which owns this service account, if the key says.
    project_id: Option<String>,

    /// The service account's email, used for logging.
    client_email: Option<String>,
}

impl Authenticator {
    /// Build an authenticator from the JSON text of a service account key.
    pub(crate) fn from_service_account_key(key_json: &str) -> Result<Self> {
        let info = serde_json::from_str::<ServiceAccountKeyInfo>(key_json)
            .context("could not parse service account key")?;
        if let Some(key_type) = &info.key_type {
            if key_type != "service_account" {
                return Err(format_err!(
                    "expected a key with type \"service_account\", found {:?}",
                    key_type,
                ));
            }
        }
        let service_account = CustomServiceAccount::from_json(key_json)
            .context("could not load service account key")?;
        Ok(Authenticator {
            service_account: Arc::new(service_account),
            project_id: info.project_id,
            client_email: info.client_email,
        })
    }

    /// The project which owns this service account.
    pub(crate) fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Get a token valid for `scopes`. Tokens are cached until they expire.
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.service_account
            .token(scopes)
            .await
            .context("could not get Google Cloud OAuth2 token")
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[test]
fn rejects_keys_of_the_wrong_type() {
    let err = Authenticator::from_service_account_key(
        r#"{"type": "authorized_user", "client_id": "x"}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("service_account"));

    assert!(Authenticator::from_service_account_key("not json").is_err());
}
