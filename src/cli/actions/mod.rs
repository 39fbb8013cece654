pub mod run;

use crate::couchdb::CouchdbConfig;

#[derive(Debug)]
pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        couchdb: CouchdbConfig,
        collectors: Vec<String>,
    },
}
