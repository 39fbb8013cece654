use super::{
    CouchdbConfig,
    error::{FetchError, FetchResult},
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

/// Thin HTTP layer over one CouchDB server: authenticated GETs, status
/// classification and JSON decoding. Holds no per-poll state.
#[derive(Clone, Debug)]
pub struct CouchdbClient {
    base_uri: String,
    username: String,
    password: SecretString,
    databases: Vec<String>,
    http: Client,
}

impl CouchdbClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base uri is not a valid absolute url or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: CouchdbConfig) -> FetchResult<Self> {
        Url::parse(&config.uri).map_err(|source| FetchError::InvalidUri {
            uri: config.uri.clone(),
            source,
        })?;

        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Transport {
                uri: config.uri.clone(),
                source,
            })?;

        Ok(Self {
            base_uri: config.uri,
            username: config.username,
            password: config.password,
            databases: config.databases,
            http,
        })
    }

    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    #[must_use]
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Append path segments to `base`, percent-encoding each one.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` cannot be parsed or cannot carry a path.
    pub fn endpoint(base: &str, segments: &[&str]) -> FetchResult<String> {
        let invalid = |source| FetchError::InvalidUri {
            uri: base.to_string(),
            source,
        };

        let mut url = Url::parse(base).map_err(invalid)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty();
            if segments.is_empty() {
                path.push("");
            }
            for segment in segments {
                path.push(segment);
            }
        }

        Ok(url.into())
    }

    /// GET `uri` and return the raw body of a response whose status is in
    /// `[200, 400)`.
    ///
    /// # Errors
    ///
    /// [`FetchError::Transport`] on connection-level failures,
    /// [`FetchError::Status`] for any other status.
    #[instrument(skip(self), level = "debug", err, fields(otel.kind = "client"))]
    pub async fn request(&self, uri: &str) -> FetchResult<Vec<u8>> {
        let transport = |source| FetchError::Transport {
            uri: uri.to_string(),
            source,
        };

        let mut request = self.http.get(uri);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(self.password.expose_secret()));
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        debug!(status, bytes = body.len(), "response received");

        if !(200..400).contains(&status) {
            return Err(FetchError::status(uri, status, &body));
        }

        Ok(body.to_vec())
    }

    /// GET `uri` and decode the body as JSON; `what` names the document in
    /// decode errors.
    ///
    /// # Errors
    ///
    /// Any [`CouchdbClient::request`] error, or [`FetchError::Decode`].
    pub async fn get_json<T: DeserializeOwned>(&self, uri: &str, what: &str) -> FetchResult<T> {
        let body = self.request(uri).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::decode(what, &e))
    }

    /// Reachability check against the server root.
    ///
    /// # Errors
    ///
    /// Any [`CouchdbClient::request`] error.
    pub async fn ping(&self) -> FetchResult<()> {
        let uri = Self::endpoint(&self.base_uri, &[])?;
        self.request(&uri).await.map(|_| ())
    }
}
