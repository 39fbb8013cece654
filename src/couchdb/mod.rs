//! CouchDB polling: generation detection, topology, stats normalization.
//!
//! One poll runs [`CouchdbClient::get_stats`], which chains:
//!
//! 1. [`version::detect_generation`]: `GET /` and check the version against
//!    `>=2.0`.
//! 2. [`topology::resolve_topology`]: `master` for 1.x, the cluster members
//!    (`GET /_membership`) for 2.x.
//! 3. [`stats::fetch_node_stats`]: `_stats` of every node.
//! 4. [`database::fetch_database_stats`]: sizes of every configured database.
//! 5. [`active_tasks::fetch_active_tasks`]: `GET /_active_tasks`, once.
//!
//! Steps run sequentially and the first error aborts the poll.

pub mod active_tasks;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod stats;
pub mod topology;
pub mod version;

pub use active_tasks::{ActiveTask, ActiveTaskTypeCounts, TaskKind, aggregate_active_tasks};
pub use client::CouchdbClient;
pub use config::CouchdbConfig;
pub use database::{DatabaseStats, DatabaseStatsByDbName};
pub use error::{FetchError, FetchResult};
pub use stats::NodeStats;
pub use topology::Topology;
pub use version::Generation;

use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Everything one poll learned about the server. Built from scratch on every
/// poll and never modified afterwards.
#[derive(Clone, Debug)]
pub struct Stats {
    pub api_version: Generation,
    pub stats_by_node_name: BTreeMap<String, NodeStats>,
    pub database_stats_by_node_name: BTreeMap<String, DatabaseStatsByDbName>,
    pub active_tasks: Vec<ActiveTask>,
}

impl Stats {
    /// Active tasks counted per node and kind.
    #[must_use]
    pub fn active_task_counts(&self) -> BTreeMap<String, ActiveTaskTypeCounts> {
        aggregate_active_tasks(&self.active_tasks)
    }
}

impl CouchdbClient {
    /// Run one full poll.
    ///
    /// # Errors
    ///
    /// The first error of any step; nothing is returned for a partial poll.
    #[instrument(skip(self), level = "info", err, fields(couchdb.uri = %self.base_uri()))]
    pub async fn get_stats(&self) -> FetchResult<Stats> {
        let generation = version::detect_generation(self).await?;
        let topology = topology::resolve_topology(self, generation).await?;

        let stats_by_node_name = stats::fetch_node_stats(self, &topology).await?;
        let database_stats_by_node_name =
            database::fetch_database_stats(self, &topology, self.databases()).await?;
        let active_tasks = active_tasks::fetch_active_tasks(self, generation).await?;

        info!(
            api_version = %generation,
            nodes = stats_by_node_name.len(),
            active_tasks = active_tasks.len(),
            "poll complete"
        );

        Ok(Stats {
            api_version: generation,
            stats_by_node_name,
            database_stats_by_node_name,
            active_tasks,
        })
    }
}
