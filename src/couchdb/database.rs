use super::{
    client::CouchdbClient,
    error::{FetchError, FetchResult},
    topology::Topology,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Database name -> sizes.
pub type DatabaseStatsByDbName = BTreeMap<String, DatabaseStats>;

#[derive(Debug, Default, Deserialize)]
struct RawSizes {
    file: Option<f64>,
    active: Option<f64>,
}

/// `GET /{db}`; 3.x only reports `sizes`, older servers report
/// `disk_size`/`data_size` (2.x both).
#[derive(Debug, Default, Deserialize)]
struct RawDatabaseInfo {
    disk_size: Option<f64>,
    data_size: Option<f64>,
    #[serde(default)]
    sizes: RawSizes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DatabaseStats {
    pub disk_size: f64,
    pub data_size: f64,
    /// Always `disk_size - data_size`, never clamped.
    pub disk_size_overhead: f64,
}

impl DatabaseStats {
    #[must_use]
    pub fn new(disk_size: f64, data_size: f64) -> Self {
        Self {
            disk_size,
            data_size,
            disk_size_overhead: disk_size - data_size,
        }
    }

    /// Decode the database info document of `db_name`.
    ///
    /// # Errors
    ///
    /// [`FetchError::Decode`] if the body is not JSON or reports no sizes.
    pub fn from_slice(db_name: &str, body: &[u8]) -> FetchResult<Self> {
        let what = || format!("database '{db_name}' stats");

        let raw: RawDatabaseInfo =
            serde_json::from_slice(body).map_err(|e| FetchError::decode(what(), &e))?;

        let disk_size = raw.disk_size.or(raw.sizes.file);
        let data_size = raw.data_size.or(raw.sizes.active);

        match (disk_size, data_size) {
            (Some(disk_size), Some(data_size)) => Ok(Self::new(disk_size, data_size)),
            _ => Err(FetchError::Decode {
                what: what(),
                reason: "neither disk_size/data_size nor sizes.file/sizes.active reported".into(),
            }),
        }
    }
}

/// Fetch the configured databases for every node of the topology.
///
/// Databases are cluster-wide, so every request goes to the root address even
/// under a clustered topology; each node gets the same set of names.
///
/// # Errors
///
/// The first fetch or decode error encountered.
#[instrument(skip(client, topology, databases), level = "info", err, fields(nodes = topology.len(), databases = databases.len()))]
pub async fn fetch_database_stats(
    client: &CouchdbClient,
    topology: &Topology,
    databases: &[String],
) -> FetchResult<BTreeMap<String, DatabaseStatsByDbName>> {
    let mut stats_by_node_name = BTreeMap::new();

    for name in topology.keys() {
        let mut by_db_name = DatabaseStatsByDbName::new();

        for db_name in databases {
            let uri = CouchdbClient::endpoint(client.base_uri(), &[db_name.as_str()])?;
            let body = client.request(&uri).await?;
            let stats = DatabaseStats::from_slice(db_name, &body)?;

            debug!(node = %name, db = %db_name, overhead = stats.disk_size_overhead, "database stats");

            by_db_name.insert(db_name.clone(), stats);
        }

        stats_by_node_name.insert(name.clone(), by_db_name);
    }

    Ok(stats_by_node_name)
}
