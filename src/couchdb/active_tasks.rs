use super::{
    client::CouchdbClient,
    error::{FetchError, FetchResult},
    topology::SINGLE_NODE_NAME,
    version::Generation,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

/// Kind of a background task as reported in `type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    DatabaseCompaction,
    ViewCompaction,
    Indexer,
    Replication,
    Unknown(String),
}

impl From<&str> for TaskKind {
    fn from(kind: &str) -> Self {
        match kind {
            "database_compaction" => Self::DatabaseCompaction,
            "view_compaction" => Self::ViewCompaction,
            "indexer" => Self::Indexer,
            "replication" => Self::Replication,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One entry of `GET /_active_tasks`; only the fields the exporter counts
/// are kept.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ActiveTask {
    /// Empty on 1.x, which knows nothing about nodes.
    #[serde(default)]
    pub node: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
}

impl ActiveTask {
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        TaskKind::from(self.task_type.as_str())
    }
}

/// Per-node task counters. `sum` counts every task, including kinds that
/// have no counter of their own.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActiveTaskTypeCounts {
    pub database_compaction: f64,
    pub view_compaction: f64,
    pub indexer: f64,
    pub replication: f64,
    pub sum: f64,
}

impl ActiveTaskTypeCounts {
    fn record(&mut self, task: &ActiveTask) {
        match task.kind() {
            TaskKind::DatabaseCompaction => self.database_compaction += 1.0,
            TaskKind::ViewCompaction => self.view_compaction += 1.0,
            TaskKind::Indexer => self.indexer += 1.0,
            TaskKind::Replication => self.replication += 1.0,
            TaskKind::Unknown(kind) => {
                warn!(task_type = %kind, node = %task.node, "unknown task type");
            }
        }
        self.sum += 1.0;
    }

    /// Sum of the four named counters.
    #[must_use]
    pub fn named(&self) -> f64 {
        self.database_compaction + self.view_compaction + self.indexer + self.replication
    }
}

/// Count tasks per node and kind in a single pass over `tasks`.
#[must_use]
pub fn aggregate_active_tasks(tasks: &[ActiveTask]) -> BTreeMap<String, ActiveTaskTypeCounts> {
    let mut by_node: BTreeMap<String, ActiveTaskTypeCounts> = BTreeMap::new();

    for task in tasks {
        by_node.entry(task.node.clone()).or_default().record(task);
    }

    by_node
}

/// Attribute every task of a single-node server to the `master` pseudo-node,
/// so tasks line up with the node stats of the same poll.
pub fn attribute_to_single_node(tasks: &mut [ActiveTask]) {
    for task in tasks {
        SINGLE_NODE_NAME.clone_into(&mut task.node);
    }
}

/// Fetch the cluster-wide task list once.
///
/// # Errors
///
/// Fails if the list cannot be fetched or decoded.
#[instrument(skip(client), level = "info", err)]
pub async fn fetch_active_tasks(
    client: &CouchdbClient,
    generation: Generation,
) -> FetchResult<Vec<ActiveTask>> {
    let uri = CouchdbClient::endpoint(client.base_uri(), &["_active_tasks"])?;
    let body = client.request(&uri).await?;

    let mut tasks: Vec<ActiveTask> =
        serde_json::from_slice(&body).map_err(|e| FetchError::decode("active tasks", &e))?;

    if generation == Generation::Single {
        attribute_to_single_node(&mut tasks);
    }

    Ok(tasks)
}
