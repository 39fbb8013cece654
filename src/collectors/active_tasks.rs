use crate::collectors::Collector;
use crate::couchdb::Stats;
use anyhow::Result;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::{debug, instrument};

/// Running background tasks per node, from `/_active_tasks`.
///
/// `couchdb_server_active_tasks` counts every task, the per-kind gauges only
/// the kinds they are named after, so the difference is the number of tasks
/// of kinds this exporter does not know about.
#[derive(Clone)]
pub struct ActiveTasksCollector {
    active_tasks: GaugeVec,
    database_compaction: GaugeVec,
    view_compaction: GaugeVec,
    indexer: GaugeVec,
    replication: GaugeVec,
}

impl Default for ActiveTasksCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::expect_used)]
fn task_gauge(metric: &str, help: &str) -> GaugeVec {
    GaugeVec::new(Opts::new(metric, help), &["node_name"]).expect("valid active task metric opts")
}

impl ActiveTasksCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active_tasks: task_gauge("couchdb_server_active_tasks", "active tasks"),
            database_compaction: task_gauge(
                "couchdb_server_active_tasks_database_compaction",
                "active tasks: database compaction",
            ),
            view_compaction: task_gauge(
                "couchdb_server_active_tasks_view_compaction",
                "active tasks: view compaction",
            ),
            indexer: task_gauge("couchdb_server_active_tasks_indexer", "active tasks: indexer"),
            replication: task_gauge(
                "couchdb_server_active_tasks_replication",
                "active tasks: replication",
            ),
        }
    }

    fn gauges(&self) -> [&GaugeVec; 5] {
        [
            &self.active_tasks,
            &self.database_compaction,
            &self.view_compaction,
            &self.indexer,
            &self.replication,
        ]
    }
}

impl Collector for ActiveTasksCollector {
    fn name(&self) -> &'static str {
        "active_tasks"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        for gauge in self.gauges() {
            registry.register(Box::new(gauge.clone()))?;
        }
        Ok(())
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    #[instrument(skip(self, stats), level = "debug", fields(collector = "active_tasks"))]
    fn update(&self, stats: &Stats) {
        for (node_name, counts) in stats.active_task_counts() {
            let labels = [node_name.as_str()];

            self.active_tasks.with_label_values(&labels).set(counts.sum);
            self.database_compaction
                .with_label_values(&labels)
                .set(counts.database_compaction);
            self.view_compaction
                .with_label_values(&labels)
                .set(counts.view_compaction);
            self.indexer.with_label_values(&labels).set(counts.indexer);
            self.replication.with_label_values(&labels).set(counts.replication);

            debug!(node = %node_name, tasks = counts.sum, "active tasks counted");
        }
    }
}
