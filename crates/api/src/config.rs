//! Service configuration from the environment.
//!
//! Every setting has a default. Unparseable values fall back to it with a warning so a
//! typo in one variable does not keep the till from starting.

use std::net::SocketAddr;
use std::str::FromStr;

use tracing::warn;

use retailpos_core::paging::DEFAULT_PER_PAGE;
use retailpos_infra::reports::PrintLayout;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    /// Needs the `postgres` feature and `DATABASE_URL`.
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub layout: PrintLayout,
    pub default_page_size: u32,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let layout = PrintLayout {
            shop_name: lookup("SHOP_NAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.layout.shop_name),
            currency_symbol: lookup("CURRENCY_SYMBOL").unwrap_or(defaults.layout.currency_symbol),
            footer: lookup("RECEIPT_FOOTER").filter(|s| !s.trim().is_empty()),
        };

        let default_page_size = parsed(&lookup, "DEFAULT_PAGE_SIZE", defaults.default_page_size);

        Self {
            bind_addr: parsed(&lookup, "BIND_ADDR", defaults.bind_addr),
            jwt_secret,
            store_backend: parsed(&lookup, "STORE_BACKEND", defaults.store_backend),
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            layout,
            default_page_size: if default_page_size == 0 {
                warn!("DEFAULT_PAGE_SIZE must be positive; using {DEFAULT_PER_PAGE}");
                DEFAULT_PER_PAGE
            } else {
                default_page_size
            },
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            layout: PrintLayout::default(),
            default_page_size: DEFAULT_PER_PAGE,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Debug,
    T::Err: core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, default = ?default, "invalid setting; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ApiConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.layout.currency_symbol, "$");
        assert_eq!(cfg.layout.shop_name, "RetailPOS");
        assert_eq!(cfg.default_page_size, 10);
    }

    #[test]
    fn reads_every_setting() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/pos"),
            ("CURRENCY_SYMBOL", "Rs "),
            ("SHOP_NAME", "Corner Mart"),
            ("DEFAULT_PAGE_SIZE", "25"),
        ]);
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/pos"));
        assert_eq!(cfg.layout.currency_symbol, "Rs ");
        assert_eq!(cfg.layout.shop_name, "Corner Mart");
        assert_eq!(cfg.default_page_size, 25);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = config(&[
            ("BIND_ADDR", "not-an-addr"),
            ("STORE_BACKEND", "mongo"),
            ("DEFAULT_PAGE_SIZE", "0"),
        ]);
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.default_page_size, 10);
    }
}
