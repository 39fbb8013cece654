pub mod cli;
pub mod collectors;
pub mod couchdb;
pub mod exporter;
