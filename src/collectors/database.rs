use crate::collectors::Collector;
use crate::couchdb::Stats;
use anyhow::Result;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::instrument;

/// Sizes of the configured databases, labelled `{node_name, db_name}`.
///
/// - `couchdb_database_disk_size`: bytes the database file takes on disk
/// - `couchdb_database_data_size`: bytes of live data
/// - `couchdb_database_overhead`: `disk_size - data_size`, may be negative
///
/// A compaction reclaims roughly the overhead; alert on its ratio to
/// `disk_size` rather than on the absolute value.
#[derive(Clone)]
pub struct DatabaseCollector {
    disk_size: GaugeVec,
    data_size: GaugeVec,
    disk_size_overhead: GaugeVec,
}

impl Default for DatabaseCollector {
    fn default() -> Self {
        Self::new()
    }
}

const DATABASE_LABELS: [&str; 2] = ["node_name", "db_name"];

#[allow(clippy::expect_used)]
fn db_gauge(metric: &str, help: &str) -> GaugeVec {
    GaugeVec::new(Opts::new(metric, help), &DATABASE_LABELS).expect("valid database metric opts")
}

impl DatabaseCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            disk_size: db_gauge("couchdb_database_disk_size", "disk size"),
            data_size: db_gauge("couchdb_database_data_size", "data size"),
            disk_size_overhead: db_gauge(
                "couchdb_database_overhead",
                "disk size overhead (disk size - data size)",
            ),
        }
    }
}

impl Collector for DatabaseCollector {
    fn name(&self) -> &'static str {
        "database"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.disk_size.clone()))?;
        registry.register(Box::new(self.data_size.clone()))?;
        registry.register(Box::new(self.disk_size_overhead.clone()))?;
        Ok(())
    }

    fn reset(&self) {
        self.disk_size.reset();
        self.data_size.reset();
        self.disk_size_overhead.reset();
    }

    #[instrument(skip(self, stats), level = "debug", fields(collector = "database"))]
    fn update(&self, stats: &Stats) {
        for (node_name, by_db_name) in &stats.database_stats_by_node_name {
            for (db_name, db) in by_db_name {
                let labels = [node_name.as_str(), db_name.as_str()];

                self.disk_size.with_label_values(&labels).set(db.disk_size);
                self.data_size.with_label_values(&labels).set(db.data_size);
                self.disk_size_overhead
                    .with_label_values(&labels)
                    .set(db.disk_size_overhead);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::couchdb::{DatabaseStats, Generation};
    use std::collections::BTreeMap;

    #[test]
    fn test_database_collector_name() {
        let collector = DatabaseCollector::new();
        assert_eq!(collector.name(), "database");
        assert!(collector.enabled_by_default());
    }

    #[test]
    fn test_update_keeps_negative_overhead() {
        let collector = DatabaseCollector::new();
        let stats = Stats {
            api_version: Generation::Single,
            stats_by_node_name: BTreeMap::new(),
            database_stats_by_node_name: BTreeMap::from([(
                "master".to_string(),
                BTreeMap::from([
                    ("_users".to_string(), DatabaseStats::new(8290.0, 3451.0)),
                    ("fresh".to_string(), DatabaseStats::new(100.0, 250.0)),
                ]),
            )]),
            active_tasks: Vec::new(),
        };

        collector.update(&stats);

        assert_eq!(
            collector
                .disk_size_overhead
                .with_label_values(&["master", "_users"])
                .get(),
            4839.0
        );
        assert_eq!(
            collector
                .disk_size_overhead
                .with_label_values(&["master", "fresh"])
                .get(),
            -150.0
        );
        assert_eq!(
            collector.data_size.with_label_values(&["master", "fresh"]).get(),
            250.0
        );
    }
}
