use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::tutor::TutorConfig;

/// Service configuration read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Directory for the rolling log file; file output is off when `None`.
    pub log_dir: Option<String>,
    /// SQLite URL for the profile store; profiles stay in memory when unset.
    pub database_url: Option<String>,
    pub tutor: TutorConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok());
        config.tutor = TutorConfig::from_env();
        config
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = lookup("HOST")
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = lookup("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let log_dir = file_logs.then(|| lookup("LOG_DIR").unwrap_or_else(|| "./logs".to_string()));

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        Self {
            host,
            port,
            log_level,
            log_dir,
            database_url,
            tutor: TutorConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn store_label(&self) -> &'static str {
        if self.database_url.is_some() {
            "sqlite"
        } else {
            "memory"
        }
    }
}
