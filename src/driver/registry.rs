// SPDX-License-Identifier: Apache-2.0

//! Driver registry.
//!
//! Maps URI schemes to adapter factories. The registry is built once at
//! first use and read-only afterwards.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use crate::driver::Driver;
use crate::error::{Error, Result};

/// Pool knobs parsed from connection-URI query parameters.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 30,
        }
    }
}

/// Parses `max_connections` / `min_connections` / `acquire_timeout_secs`
/// from a raw query string; unknown parameters are ignored.
pub(crate) fn parse_pool_options(query: Option<&str>) -> PoolOptions {
    let mut options = PoolOptions::default();
    let Some(query) = query else {
        return options;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "max_connections" => {
                if let Ok(v) = value.parse() {
                    options.max_connections = v;
                }
            }
            "min_connections" => {
                if let Ok(v) = value.parse() {
                    options.min_connections = v;
                }
            }
            "acquire_timeout_secs" => {
                if let Ok(v) = value.parse() {
                    options.acquire_timeout_secs = v;
                }
            }
            _ => {}
        }
    }
    options
}

/// Creates drivers for the URI schemes it claims.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    fn schemes(&self) -> &'static [&'static str];

    async fn connect(&self, url: &str) -> Result<Driver>;
}

static REGISTRY: OnceLock<Vec<Arc<dyn DriverFactory>>> = OnceLock::new();

fn factories() -> &'static [Arc<dyn DriverFactory>] {
    REGISTRY
        .get_or_init(|| {
            vec![
                Arc::new(crate::driver::mysql::MySqlFactory),
                Arc::new(crate::driver::postgres::PostgresFactory),
                Arc::new(crate::driver::sqlite::SqliteFactory),
            ]
        })
        .as_slice()
}

/// Connects to a database by URI, dispatching on the scheme.
pub async fn connect(url: &str) -> Result<Driver> {
    let scheme = url
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if scheme.is_empty() {
        return Err(Error::connection_failed(format!("missing URI scheme: {url}")));
    }

    for factory in factories() {
        if factory.schemes().contains(&scheme.as_str()) {
            return factory.connect(url).await;
        }
    }
    Err(Error::driver_not_found(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_options_parse_with_defaults() {
        let options = parse_pool_options(None);
        assert_eq!(options.max_connections, 5);

        let options = parse_pool_options(Some("max_connections=10&acquire_timeout_secs=5&junk=1"));
        assert_eq!(options.max_connections, 10);
        assert_eq!(options.min_connections, 0);
        assert_eq!(options.acquire_timeout_secs, 5);
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = connect("oracle://localhost/db").await.unwrap_err();
        assert!(matches!(err, Error::DriverNotFound { .. }));
    }
}
