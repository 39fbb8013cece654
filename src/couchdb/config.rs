use secrecy::SecretString;

/// Everything needed to reach and poll one CouchDB server.
#[derive(Clone, Debug)]
pub struct CouchdbConfig {
    /// Root address, without trailing slash.
    pub uri: String,
    pub username: String,
    pub password: SecretString,
    /// Skip TLS certificate verification (self-signed clusters).
    pub insecure: bool,
    /// Databases whose sizes are reported.
    pub databases: Vec<String>,
}

impl CouchdbConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri: String = uri.into();
        Self {
            uri: uri.trim_end_matches('/').to_string(),
            username: String::new(),
            password: SecretString::from(String::new()),
            insecure: true,
            databases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = username.into();
        self.password = password;
        self
    }

    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the databases to monitor; names are trimmed, empty names dropped
    /// and duplicates removed keeping the first occurrence.
    #[must_use]
    pub fn with_databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for name in databases {
            let name = name.as_ref().trim();
            if !name.is_empty() && !cleaned.iter().any(|d| d == name) {
                cleaned.push(name.to_string());
            }
        }
        self.databases = cleaned;
        self
    }
}
