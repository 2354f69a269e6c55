use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_JAEGER_AGENT: &str = "localhost:6831";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Full connection string, takes precedence over the individual fields
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Build database URL from configuration
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "orders".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
            url: None,
        }
    }
}

/// Kafka consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "orders".to_string(),
            group_id: "order-service".to_string(),
        }
    }
}

/// Log filtering and span export
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `info,order_store=debug`
    pub log_filter: String,
    /// Jaeger agent address; span export is off when unset
    pub jaeger_agent: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            jaeger_agent: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub port: u16,
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            kafka: KafkaConfig::default(),
            port: 8081,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for unset keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let string_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        let database = DatabaseConfig {
            host: string_or("DB_HOST", defaults.database.host),
            port: parse_or(&lookup, "DB_PORT", defaults.database.port)?,
            username: string_or("DB_USER", defaults.database.username),
            password: string_or("DB_PASSWORD", defaults.database.password),
            database: string_or("DB_NAME", defaults.database.database),
            max_connections: parse_or(
                &lookup,
                "DB_MAX_CONNECTIONS",
                defaults.database.max_connections,
            )?,
            acquire_timeout_secs: parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.database.acquire_timeout_secs,
            )?,
            url: lookup("DATABASE_URL"),
        };

        let kafka = KafkaConfig {
            brokers: string_or("KAFKA_BROKERS", defaults.kafka.brokers),
            topic: string_or("KAFKA_TOPIC", defaults.kafka.topic),
            group_id: string_or("CONSUMER_GROUP", defaults.kafka.group_id),
        };

        let telemetry = TelemetryConfig {
            log_filter: string_or("RUST_LOG", defaults.telemetry.log_filter),
            jaeger_agent: if parse_or(&lookup, "ENABLE_JAEGER", false)? {
                Some(string_or("JAEGER_ENDPOINT", DEFAULT_JAEGER_AGENT.to_string()))
            } else {
                None
            },
        };

        Ok(Self {
            database,
            kafka,
            port: parse_or(&lookup, "PORT", defaults.port)?,
            telemetry,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
