/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development; override via
/// environment variables in production.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8600`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    ///
    /// Applies to the inbound middleware stack only; retrieval calls run
    /// under their own effective timeout.
    pub request_timeout_secs: u64,
    /// Base URL of the VM diagnostics agent (default: `http://127.0.0.1:8700`).
    pub agent_base_url: String,
    /// Transport-level timeout for one agent exchange in seconds
    /// (default: `3600`, matching the widest retrieval timeout).
    pub agent_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `HOST`                 | `0.0.0.0`                |
    /// | `PORT`                 | `8600`                   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `AGENT_BASE_URL`       | `http://127.0.0.1:8700`  |
    /// | `AGENT_TIMEOUT_SECS`   | `3600`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8600".into())
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let agent_base_url = std::env::var("AGENT_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8700".into());

        let agent_timeout_secs: u64 = std::env::var("AGENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("AGENT_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            request_timeout_secs,
            agent_base_url,
            agent_timeout_secs,
        }
    }
}
