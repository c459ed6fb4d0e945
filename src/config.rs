use clap::Parser;

// ============================================================================
// Service Configuration
// ============================================================================
//
// Every option can come from the command line or the environment. Without a
// database URL the service keeps its data in memory.
//
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Order management REST API", long_about = None)]
pub struct Config {
    /// Address the API server listens on
    #[arg(long, env = "ORDERS_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port of the API server
    #[arg(long, env = "ORDERS_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Port of the Prometheus metrics server
    #[arg(long, env = "ORDERS_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// PostgreSQL connection string; in-memory storage when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum connections in the PostgreSQL pool
    #[arg(long, env = "ORDERS_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// Connection attempts before giving up at startup
    #[arg(long, env = "ORDERS_DB_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub db_connect_attempts: u32,

    /// Default `limit` when listing orders
    #[arg(long, env = "ORDERS_PAGE_SIZE", default_value_t = 100)]
    pub page_size: usize,

    /// Largest `limit` a client may ask for
    #[arg(long, env = "ORDERS_MAX_PAGE_SIZE", default_value_t = 1000)]
    pub max_page_size: usize,

    /// Tracing filter directives (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info,orders_api=debug")]
    pub log_filter: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page size must be at least 1");
        }
        if self.page_size > self.max_page_size {
            anyhow::bail!(
                "page size {} exceeds max page size {}",
                self.page_size,
                self.max_page_size
            );
        }
        if self.db_max_connections == 0 {
            anyhow::bail!("database pool needs at least one connection");
        }
        Ok(())
    }

    pub fn pagination(&self) -> PageSettings {
        PageSettings {
            default_limit: self.page_size,
            max_limit: self.max_page_size,
        }
    }
}

/// Limits applied to list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["orders_api"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_arguments() {
        let config = parse(&[
            "--port",
            "8080",
            "--database-url",
            "postgres://localhost/orders",
            "--page-size",
            "20",
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert_eq!(config.pagination().default_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = parse(&["--page-size", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_above_max_rejected() {
        let config = parse(&["--page-size", "50", "--max-page-size", "10"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_port_is_a_parse_error() {
        assert!(Config::try_parse_from(["orders_api", "--port", "not-a-port"]).is_err());
    }
}
