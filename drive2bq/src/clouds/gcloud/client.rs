//! A Google Cloud REST client.

use mime::{self, Mime};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{
    self,
    header::{HeaderMap, CONTENT_TYPE},
    IntoUrl, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{error, fmt};

use super::auth::{AccessToken, Authenticator};
use crate::common::*;
use crate::tls::rustls_client_config;

/// The OAuth2 scopes that we'll need.
static SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/bigquery",
];

/// An empty `GET` query.
#[derive(Debug, Serialize)]
pub(crate) struct NoQuery;

/// Alternative media types for Google Cloud REST APIs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Alt {
    /// Return the underlying media data.
    Media,
}

/// An HTTP client error. We break out a few specified statuses our caller might
/// care about.
#[derive(Debug)]
pub(crate) enum ClientError {
    /// The resource at URL was not found.
    NotFound { method: String, url: Url },
    /// Another error occured. We don't currently care about the details.
    Other(Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::NotFound { method, url } => {
                write!(f, "cannot {} {}: Not Found", method, url)
            }
            ClientError::Other(err) => write!(f, "{:#}", err),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ClientError::NotFound { .. } => None,
            ClientError::Other(err) => err.source(),
        }
    }
}

impl From<Error> for ClientError {
    fn from(err: Error) -> Self {
        ClientError::Other(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Other(err.into())
    }
}

/// A Google Cloud REST client using OAuth2.
///
/// Requests are never retried. A failed request fails the current stage.
#[derive(Clone, Debug)]
pub(crate) struct Client {
    /// An authenticator that provides OAuth2 tokens.
    authenticator: Authenticator,

    /// Our HTTP client.
    client: reqwest::Client,
}

impl Client {
    /// Create a new Google Cloud client.
    #[instrument(level = "trace", skip(authenticator))]
    pub(crate) fn new(authenticator: Authenticator) -> Result<Client> {
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(rustls_client_config()?)
            .build()
            .context("could not build HTTP client")?;
        Ok(Client {
            authenticator,
            client,
        })
    }

    /// The authenticator used by this client.
    pub(crate) fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Make an HTTP GET request and return the response.
    async fn get_helper(
        &self,
        url: &Url,
        headers: HeaderMap,
    ) -> Result<reqwest::Response, ClientError> {
        trace!("GET {}", url);
        let token = self.token().await?;
        Ok(self
            .client
            .get(url.as_str())
            .bearer_auth(token.as_str())
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("could not GET {}", url))?)
    }

    /// Make an HTTP GET request with the specified URL and query parameters,
    /// and deserialize the result.
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn get<Output, U, Query>(
        &self,
        url: U,
        query: Query,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
    {
        let url = build_url(url, query)?;
        let http_resp = self.get_helper(&url, HeaderMap::default()).await?;
        self.handle_response("GET", &url, http_resp).await
    }

    /// Make an HTTP GET request with the specified URL and query parameters,
    /// and return the raw response so the body can be streamed.
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn get_response<U, Query>(
        &self,
        url: U,
        query: Query,
    ) -> Result<reqwest::Response, ClientError>
    where
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
    {
        let url = build_url(url, query)?;
        let http_resp = self.get_helper(&url, HeaderMap::default()).await?;
        if http_resp.status().is_success() {
            Ok(http_resp)
        } else {
            Err(self.handle_error("GET", &url, http_resp).await)
        }
    }

    /// Make an HTTP POST request with the specified URL and JSON body.
    #[instrument(level = "trace", skip(self, body))]
    pub(crate) async fn post<Output, U, Query, Body>(
        &self,
        url: U,
        query: Query,
        body: Body,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
        Body: fmt::Debug + Serialize,
    {
        let url = build_url(url, query)?;
        trace!("POST {} {:?}", url, body);
        trace!("serialized {}", serde_json::to_string(&body)?);
        let token = self.token().await?;
        let http_resp = self
            .client
            .post(url.as_str())
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("could not POST {}", url))?;
        self.handle_response("POST", &url, http_resp).await
    }

    /// POST a pre-built body with the specified content type, and deserialize
    /// the result.
    #[instrument(level = "trace", skip(self, body), fields(body_len = body.len()))]
    pub(crate) async fn post_body<Output, U, Query>(
        &self,
        url: U,
        query: Query,
        content_type: &str,
        body: Bytes,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
    {
        let url = build_url(url, query)?;
        trace!("POST {} with {} bytes of {}", url, body.len(), content_type);
        let token = self.token().await?;
        let http_resp = self
            .client
            .post(url.as_str())
            .bearer_auth(token.as_str())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .with_context(|| format!("could not POST {}", url))?;
        self.handle_response("POST", &url, http_resp).await
    }

    /// Get an access token.
    async fn token(&self) -> Result<AccessToken> {
        self.authenticator.token(SCOPES).await
    }

    /// Handle an HTTP response.
    async fn handle_response<Output>(
        &self,
        method: &str,
        url: &Url,
        http_resp: reqwest::Response,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
    {
        if http_resp.status().is_success() {
            let resp = http_resp.json::<Output>().await.with_context(|| {
                format!("error fetching JSON response from {}", url)
            })?;
            trace!("{} returned {:?}", method, resp);
            Ok(resp)
        } else {
            Err(self.handle_error(method, url, http_resp).await)
        }
    }

    /// Handle an HTTP error response.
    async fn handle_error(
        &self,
        method: &str,
        url: &Url,
        http_resp: reqwest::Response,
    ) -> ClientError {
        // Return 404 Not Found as a special case.
        if http_resp.status() == StatusCode::NOT_FOUND {
            return ClientError::NotFound {
                method: method.to_owned(),
                url: url.to_owned(),
            };
        }

        // Decide if we should even try to parse this response as JSON before we
        // consume our http_resp.
        let status = http_resp.status();
        let should_parse_as_json = response_claims_to_be_json(&http_resp);

        let err_body_result = http_resp
            .bytes()
            .await
            .with_context(|| format!("error fetching error response from {}", url));
        let err_body = match err_body_result {
            Ok(err_body) => err_body,
            Err(err) => return err.into(),
        };
        error_from_body(method, url, status, should_parse_as_json, &err_body)
    }
}

/// Turn the body of an HTTP error response into a `ClientError`, using the
/// Google Cloud JSON error format if we can.
fn error_from_body(
    method: &str,
    url: &Url,
    status: StatusCode,
    should_parse_as_json: bool,
    err_body: &[u8],
) -> ClientError {
    if should_parse_as_json {
        if let Ok(resp) = serde_json::from_slice::<ErrorResponse>(err_body) {
            trace!("{} error {:?}", method, resp);
            let err: Error = resp.error.into();
            return err.context(format!("{} error {}", method, url)).into();
        }
    }

    // Some Google endpoints return HTML or plain text errors, so just report
    // whatever we have.
    let raw_err = String::from_utf8_lossy(err_body);
    trace!(
        "{} {}: expected JSON describing error, but got {:?}",
        method,
        url,
        raw_err,
    );
    let err = format_err!("HTTP status {}: {:?}", status, raw_err);
    err.context(format!("{} error {}", method, url)).into()
}

/// Construct a URL from something we can convert to URL, and something that we
/// can serialize as a query string.
fn build_url<U, Query>(url: U, query: Query) -> Result<Url>
where
    U: IntoUrl,
    Query: fmt::Debug + Serialize,
{
    let mut url = url.into_url().context("could not parse URL")?;
    let query_str = serde_urlencoded::to_string(&query)?;
    if !query_str.is_empty() {
        url.set_query(Some(&query_str));
    }
    Ok(url)
}

/// A Google Cloud error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    /// The actual error.
    error: GCloudError,
}

/// Information about a GCloud error.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct GCloudError {
    pub(crate) code: i32,
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) errors: Vec<ErrorDetail>,
}

impl fmt::Display for GCloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Google Cloud error: {} {}", self.code, self.message)
    }
}

impl error::Error for GCloudError {}

/// Details about an individial GCloud error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub(crate) domain: String,
    #[serde(default)]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) message: String,
    pub(crate) location_type: Option<String>,
    pub(crate) location: Option<String>,
}

/// Percent-encode a string for use as a URL path component.
pub(crate) fn percent_encode(s: &str) -> impl fmt::Display + '_ {
    utf8_percent_encode(s, NON_ALPHANUMERIC)
}

/// Returns `true` if `http_response` claims to be a JSON response.
pub(crate) fn response_claims_to_be_json(http_resp: &reqwest::Response) -> bool {
    let content_type = match http_resp.headers().get(CONTENT_TYPE) {
        Some(content_type) => content_type,
        None => return false,
    };
    let content_type_str = match content_type.to_str() {
        Ok(content_type_str) => content_type_str,
        Err(err) => {
            error!("Non-ASCII content type {:?}: {}", content_type, err);
            return false;
        }
    };
    content_type_is_json(content_type_str)
}

/// Does `content_type` name a JSON media type?
fn content_type_is_json(content_type: &str) -> bool {
    match content_type.parse::<Mime>() {
        Ok(mime) => mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON,
        Err(err) => {
            error!("Could not parse content type {:?}: {}", content_type, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct PageQuery<'a> {
        page_token: Option<&'a str>,
        page_size: u32,
    }

    #[test]
    fn build_url_serializes_query() {
        let url = build_url(
            "https://example.com/files",
            PageQuery {
                page_token: None,
                page_size: 10,
            },
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://example.com/files?pageSize=10");

        let url = build_url("https://example.com/files", NoQuery).unwrap();
        assert_eq!(url.as_str(), "https://example.com/files");
    }

    #[test]
    fn percent_encode_escapes_path_separators() {
        assert_eq!(percent_encode("a/b c").to_string(), "a%2Fb%20c");
    }

    #[test]
    fn detects_json_content_types() {
        assert!(content_type_is_json("application/json; charset=UTF-8"));
        assert!(!content_type_is_json("text/html"));
    }

    #[test]
    fn formats_json_and_raw_errors() {
        let url = "https://example.com/x".parse::<Url>().unwrap();
        let body = br#"{"error": {"code": 403, "message": "Forbidden"}}"#;
        let err = error_from_body("GET", &url, StatusCode::FORBIDDEN, true, body);
        let msg = err.to_string();
        assert!(msg.contains("GET error https://example.com/x"));
        assert!(msg.contains("Google Cloud error: 403 Forbidden"));

        let err = error_from_body(
            "POST",
            &url,
            StatusCode::BAD_GATEWAY,
            false,
            b"<html>oops</html>",
        );
        assert!(err.to_string().contains("oops"));
    }
}
