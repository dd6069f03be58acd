use anyhow::Context;
use serde::Deserialize;

/// Config, read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve userfacing pages
    pub userfacing_listen_address: String,

    /// <address>:<port> to serve admin endpoints
    pub admin_listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    pub human_logs: bool,

    /// Max HTTP body size the API accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// password to connect to database.
    pub db_dsn: String,

    /// maximum number of connections maintained by PostgresStore
    pub db_pool_size: u32,

    /// maximum seconds waiting for a database connection
    pub db_connection_timeout: u64,

    /// HMAC secret shared with the identity provider that signs session tokens.
    pub jwt_secret: String,

    /// Bearer token required by the admin API.
    pub admin_token: String,

    /// Where anonymous users get sent when they hit a page that needs a login.
    #[serde(default = "login_url")]
    pub login_url: String,

    /// How long a rendered index page is served from the cache.
    #[serde(default = "index_cache_secs")]
    pub index_cache_secs: u64,

    /// Most index pages kept in the cache at once.
    #[serde(default = "index_cache_max_entries")]
    pub index_cache_max_entries: usize,
}

impl Config {
    pub fn from_file(filepath: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(filepath)
            .with_context(|| format!("couldn't read config file {}", filepath))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, anyhow::Error> {
        toml::from_str(contents).context("couldn't parse config file")
    }
}

fn max_body_size() -> usize {
    65536
}

fn login_url() -> String {
    "/auth/login/".to_owned()
}

fn index_cache_secs() -> u64 {
    20
}

fn index_cache_max_entries() -> usize {
    300
}
