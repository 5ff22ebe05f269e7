use serde::Deserialize;

use crate::model::DAILY_COMMENT_LIMIT;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// When unset the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub admin_jwt_secret: String,
    pub daily_comment_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080),
            database_url: std::env::var("DATABASE_URL").ok(),
            admin_jwt_secret: std::env::var("ADMIN_JWT_SECRET").unwrap_or_default(),
            daily_comment_limit: std::env::var("DAILY_COMMENT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DAILY_COMMENT_LIMIT),
        }
    }
}
