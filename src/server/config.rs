use super::RequestsLoggingLevel;
use regex::Regex;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub content_cache_age_sec: usize,
    /// Browser origins allowed by CORS. Empty allows none.
    pub allowed_origins: Vec<Regex>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8080,
            metrics_port: 9091,
            content_cache_age_sec: 3600,
            allowed_origins: Vec::new(),
        }
    }
}
