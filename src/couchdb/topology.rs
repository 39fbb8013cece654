use super::{
    client::CouchdbClient,
    error::{FetchError, FetchResult},
    version::Generation,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Name of the pseudo-node standing for a single-node server.
pub const SINGLE_NODE_NAME: &str = "master";

/// Node name -> base address used to query that node's stats.
pub type Topology = BTreeMap<String, String>;

/// `GET /_membership`
#[derive(Debug, Default, Deserialize)]
pub struct MembershipResponse {
    #[serde(default)]
    pub all_nodes: Vec<String>,
    #[serde(default)]
    pub cluster_nodes: Vec<String>,
}

/// The single-node topology: one `master` entry at the root address.
#[must_use]
pub fn single_node_topology(base_uri: &str) -> Topology {
    BTreeMap::from([(SINGLE_NODE_NAME.to_string(), base_uri.to_string())])
}

/// Map every cluster member to its node-scoped address. Only
/// `cluster_nodes` are monitored; nodes merely known to the cluster are not.
///
/// # Errors
///
/// [`FetchError::EmptyMembership`] when there are no cluster members.
pub fn cluster_topology(base_uri: &str, membership: &MembershipResponse) -> FetchResult<Topology> {
    if membership.cluster_nodes.is_empty() {
        return Err(FetchError::EmptyMembership);
    }

    membership
        .cluster_nodes
        .iter()
        .map(|name| {
            let uri = CouchdbClient::endpoint(base_uri, &["_node", name.as_str()])?;
            Ok((name.clone(), uri))
        })
        .collect()
}

/// Resolve which nodes to poll and where.
///
/// # Errors
///
/// For clustered servers, fails if the membership cannot be fetched or lists
/// no cluster members.
#[instrument(skip(client), level = "info", err)]
pub async fn resolve_topology(client: &CouchdbClient, generation: Generation) -> FetchResult<Topology> {
    match generation {
        Generation::Single => Ok(single_node_topology(client.base_uri())),
        Generation::Clustered => {
            let uri = CouchdbClient::endpoint(client.base_uri(), &["_membership"])?;
            let membership: MembershipResponse = client.get_json(&uri, "membership").await?;

            for (i, name) in membership.cluster_nodes.iter().enumerate() {
                debug!(index = i, node = %name, "cluster member");
            }

            cluster_topology(client.base_uri(), &membership)
        }
    }
}
