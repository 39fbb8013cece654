use super::{
    client::CouchdbClient,
    error::{FetchError, FetchResult},
};
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::fmt;
use tracing::{info, instrument};

/// Servers matching this requirement speak the clustered API.
pub const CLUSTERED_REQUIREMENT: &str = ">=2.0";

/// `GET /`
#[derive(Debug, Deserialize)]
pub struct RootResponse {
    #[serde(default)]
    pub couchdb: String,
    pub version: String,
}

/// API generation of the target server. Only the single-node (1.x) and
/// clustered (2.x and later) shapes are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    Single,
    Clustered,
}

impl Generation {
    /// Version string used for the `api_version` of a poll.
    #[must_use]
    pub const fn api_version(self) -> &'static str {
        match self {
            Self::Single => "1",
            Self::Clustered => "2",
        }
    }

    /// Classify a server-reported version string.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::VersionParse`] if the version cannot be parsed.
    pub fn from_version(raw: &str) -> FetchResult<Self> {
        let version = parse_server_version(raw)?;
        let clustered =
            VersionReq::parse(CLUSTERED_REQUIREMENT).map_err(|source| FetchError::VersionParse {
                version: CLUSTERED_REQUIREMENT.to_string(),
                source,
            })?;

        if clustered.matches(&version) {
            Ok(Self::Clustered)
        } else {
            Ok(Self::Single)
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_version())
    }
}

/// Parse a CouchDB version, padding missing minor/patch components
/// ("2" -> "2.0.0", "1.6" -> "1.6.0") and tolerating a leading `v`.
///
/// # Errors
///
/// Returns [`FetchError::VersionParse`] if the result is not valid semver.
pub fn parse_server_version(raw: &str) -> FetchResult<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);

    let normalized = match core.matches('.').count() {
        0 if !core.is_empty() => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };

    Version::parse(&normalized).map_err(|source| FetchError::VersionParse {
        version: raw.to_string(),
        source,
    })
}

/// Fetch the root document and decide which API generation the server speaks.
///
/// # Errors
///
/// Fails if the root document cannot be fetched or decoded, or if its
/// version cannot be parsed.
#[instrument(skip(client), level = "info", err, fields(couchdb.uri = %client.base_uri()))]
pub async fn detect_generation(client: &CouchdbClient) -> FetchResult<Generation> {
    let uri = CouchdbClient::endpoint(client.base_uri(), &[])?;
    let root: RootResponse = client.get_json(&uri, "root document").await?;

    let generation = Generation::from_version(&root.version)?;

    info!(version = %root.version, api_version = %generation, "relaxing on couch");

    Ok(generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_generation() {
        assert_eq!(Generation::from_version("1.6.1").unwrap(), Generation::Single);
        assert_eq!(Generation::from_version("1.7.2").unwrap(), Generation::Single);
    }

    #[test]
    fn test_clustered_generation() {
        assert_eq!(Generation::from_version("2.1.0").unwrap(), Generation::Clustered);
        assert_eq!(Generation::from_version("2.0.0").unwrap(), Generation::Clustered);
        assert_eq!(Generation::from_version("3.3.3").unwrap(), Generation::Clustered);
    }

    #[test]
    fn test_short_versions_are_padded() {
        assert_eq!(parse_server_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_server_version("1.6").unwrap(), Version::new(1, 6, 0));
        assert_eq!(parse_server_version(" v3.2.1 ").unwrap(), Version::new(3, 2, 1));
        assert_eq!(Generation::from_version("2.0").unwrap(), Generation::Clustered);
    }

    #[test]
    fn test_suffix_is_kept() {
        let version = parse_server_version("3.1-rc1").unwrap();
        assert_eq!(version.to_string(), "3.1.0-rc1");
    }

    #[test]
    fn test_unparseable_version() {
        for raw in ["", "not-a-version", "2.x.1", "1.2.3.4"] {
            let err = Generation::from_version(raw).unwrap_err();
            assert!(
                matches!(err, FetchError::VersionParse { ref version, .. } if version == raw),
                "expected VersionParse for {raw:?}, got {err}"
            );
        }
    }

    #[test]
    fn test_api_version() {
        assert_eq!(Generation::Single.api_version(), "1");
        assert_eq!(Generation::Clustered.to_string(), "2");
    }

    #[test]
    fn test_root_response_decodes() {
        let root: RootResponse =
            serde_json::from_str(r#"{"couchdb":"Welcome","version":"2.1.0","vendor":{"name":"The Apache Software Foundation"}}"#)
                .unwrap();
        assert_eq!(root.couchdb, "Welcome");
        assert_eq!(root.version, "2.1.0");
    }
}
