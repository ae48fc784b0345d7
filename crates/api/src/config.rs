use std::path::PathBuf;
use std::str::FromStr;

/// Which [`Store`](clipcraftr_db::store::Store) implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight dispatches (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `Postgres`.
    pub database_url: Option<String>,
    /// Where downloaded clips and rendered montages are written.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `4000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `STORE_BACKEND`         | `postgres`              |
    /// | `DATABASE_URL`          | required for postgres   |
    /// | `UPLOAD_DIR`            | `./uploads`             |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 4000u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_var("SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let store_backend = parse_var("STORE_BACKEND", StoreBackend::Postgres)?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store_backend,
            database_url,
            upload_dir,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" Postgres ".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_matches!(
            "mongo".parse::<StoreBackend>(),
            Err(ConfigError::Invalid { key: "STORE_BACKEND", .. })
        );
    }

    #[test]
    fn parse_var_rejects_garbage() {
        std::env::set_var("CLIPCRAFTR_TEST_PORT", "eighty");
        assert_matches!(
            parse_var("CLIPCRAFTR_TEST_PORT", 80u16),
            Err(ConfigError::Invalid { .. })
        );
        std::env::remove_var("CLIPCRAFTR_TEST_PORT");
        assert_eq!(parse_var("CLIPCRAFTR_TEST_PORT", 80u16).unwrap(), 80);
    }
}
