use crate::{
    cli::actions::Action,
    collectors::{COLLECTOR_NAMES, Collector, all_factories},
    couchdb::CouchdbConfig,
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use tracing::info;

pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    let listen = matches.get_one::<String>("listen").cloned();

    let couchdb = couchdb_config(matches)?;

    info!(
        couchdb.uri = %couchdb.uri,
        databases = ?couchdb.databases,
        "Monitoring CouchDB"
    );

    Ok(Action::Run {
        port,
        listen,
        couchdb,
        collectors: get_enabled_collectors(matches),
    })
}

fn couchdb_config(matches: &ArgMatches) -> Result<CouchdbConfig> {
    let uri = matches
        .get_one::<String>("couchdb.uri")
        .ok_or_else(|| anyhow!("CouchDB URI is required. Please provide it using --couchdb.uri."))?;

    let username = matches
        .get_one::<String>("couchdb.username")
        .cloned()
        .unwrap_or_default();

    let password = SecretString::from(
        matches
            .get_one::<String>("couchdb.password")
            .cloned()
            .unwrap_or_default(),
    );

    let insecure = matches
        .get_one::<bool>("couchdb.insecure")
        .copied()
        .unwrap_or(true);

    let databases = matches
        .get_many::<String>("databases")
        .into_iter()
        .flatten();

    Ok(CouchdbConfig::new(uri.as_str())
        .with_basic_auth(username, password)
        .with_insecure(insecure)
        .with_databases(databases))
}

/// Collector names to build, honoring `--collector.<name>` and
/// `--no-collector.<name>` over each collector's default.
pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    COLLECTOR_NAMES
        .iter()
        .filter(|&&name| {
            if matches.get_flag(&format!("no-collector.{name}")) {
                return false;
            }

            if matches.get_flag(&format!("collector.{name}")) {
                return true;
            }

            factories
                .get(name)
                .is_some_and(|factory| factory().enabled_by_default())
        })
        .map(|&name| name.to_string())
        .collect()
}
