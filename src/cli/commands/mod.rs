use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

mod collectors;

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("couchdb_exporter")
        .about("CouchDB metric exporter for Prometheus")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(crate::exporter::GIT_COMMIT_HASH)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9984")
                .env("COUCHDB_EXPORTER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .help("IP address to bind to (default: [::], falling back to 0.0.0.0)")
                .env("COUCHDB_EXPORTER_LISTEN")
                .value_name("IP"),
        )
        .arg(
            Arg::new("couchdb.uri")
                .long("couchdb.uri")
                .help("URI of the CouchDB server")
                .default_value("http://localhost:5984")
                .env("COUCHDB_URI")
                .value_name("URI"),
        )
        .arg(
            Arg::new("couchdb.username")
                .long("couchdb.username")
                .help("Basic auth username; no Authorization header is sent when empty")
                .env("COUCHDB_USERNAME")
                .value_name("USERNAME"),
        )
        .arg(
            Arg::new("couchdb.password")
                .long("couchdb.password")
                .help("Basic auth password")
                .env("COUCHDB_PASSWORD")
                .hide_env_values(true)
                .value_name("PASSWORD"),
        )
        .arg(
            Arg::new("couchdb.insecure")
                .long("couchdb.insecure")
                .help("Skip verification of the server certificate when using https")
                .env("COUCHDB_INSECURE")
                .value_parser(clap::value_parser!(bool))
                .num_args(0..=1)
                .default_value("true")
                .default_missing_value("true"),
        )
        .arg(
            Arg::new("databases")
                .long("databases")
                .help("Comma-separated list of databases to report sizes for")
                .env("COUCHDB_DATABASES")
                .value_name("_users,orders,...")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    collectors::add_collectors_args(cmd)
}
