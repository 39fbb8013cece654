use crate::couchdb::Stats;
use anyhow::Result;
use prometheus::Registry;
use std::collections::HashMap;

#[macro_use]
mod register_macro;

/// A group of gauges filled from one poll.
pub trait Collector {
    fn name(&self) -> &'static str;

    fn enabled_by_default(&self) -> bool;

    /// Register the group's gauges with the prometheus registry
    fn register_metrics(&self, registry: &Registry) -> Result<()>;

    /// Drop every labelled series, so a failed poll leaves nothing behind
    fn reset(&self);

    /// Populate the gauges from a completed poll
    fn update(&self, stats: &Stats);
}

register_collectors! {
    node => NodeCollector,
    database => DatabaseCollector,
    active_tasks => ActiveTasksCollector,
}

pub mod config;
pub mod registry;
pub mod scraper;
