use config::{Config, ConfigError, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub storage_root: String,
    pub maps_api_key: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Defaults, then `efinder.toml` if present, then the environment (after `.env`).
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Config::builder()
            .set_default("database_url", "efinder.db")?
            .set_default("database_max_connections", 8)?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("jwt_ttl_hours", 24)?
            .set_default("storage_root", "storage/public")?
            .add_source(File::with_name("efinder").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Key for the map widget, treating a blank value as unset.
    pub fn maps_key(&self) -> Option<&str> {
        self.maps_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

// Hand-written so the JWT secret and admin password never reach the logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("database_max_connections", &self.database_max_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("storage_root", &self.storage_root)
            .field("maps_api_key", &self.maps_key().map(|_| "<set>"))
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            database_url: ":memory:".into(),
            database_max_connections: 1,
            host: "0.0.0.0".into(),
            port: 9000,
            jwt_secret: "top-secret".into(),
            jwt_ttl_hours: 24,
            storage_root: "storage".into(),
            maps_api_key: Some("   ".into()),
            admin_email: None,
            admin_password: Some("hunter22".into()),
        }
    }

    #[test]
    fn blank_maps_key_counts_as_unset() {
        assert_eq!(sample().maps_key(), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("hunter22"));
        assert_eq!(sample().bind_address(), "0.0.0.0:9000");
    }
}
