//! Database configuration.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub connect_options: PgConnectOptions,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Apply bundled migrations on connect
    pub run_migrations: bool,
}

impl DbConfig {
    /// Read `DATABASE_URL`, falling back to `DB_HOST`/`DB_PORT`/`DB_USER`/`DB_PASSWORD`/`DB_NAME`.
    pub fn from_env() -> DbResult<Self> {
        let connect_options = match std::env::var("DATABASE_URL") {
            Ok(url) => parse_url(&url)?,
            Err(_) => {
                let host = std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
                let port = match std::env::var("DB_PORT") {
                    Ok(port) => port
                        .parse()
                        .map_err(|_| DbError::Config(format!("invalid DB_PORT {}", port)))?,
                    Err(_) => 5432,
                };
                let user = std::env::var("DB_USER").unwrap_or_else(|_| "vframe".to_string());
                let password = std::env::var("DB_PASSWORD").unwrap_or_default();
                let name = std::env::var("DB_NAME").unwrap_or_else(|_| "vframe".to_string());
                connect_options(&host, port, &user, &password, &name)
            }
        };

        Ok(Self {
            connect_options,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
            acquire_timeout: Duration::from_secs(5),
            run_migrations: std::env::var("DB_RUN_MIGRATIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn parse_url(url: &str) -> DbResult<PgConnectOptions> {
    url.parse()
        .map_err(|e| DbError::Config(format!("invalid DATABASE_URL: {}", e)))
}

fn connect_options(host: &str, port: u16, user: &str, password: &str, name: &str) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .database(name)
        .ssl_mode(PgSslMode::Disable);
    if password.is_empty() {
        options
    } else {
        options.password(password)
    }
}
