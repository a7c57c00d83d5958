//! API configuration.

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Redis connection URL, shared by the queue and the event relay
    pub redis_url: String,
    /// Bucket receiving source uploads
    pub upload_bucket: String,
    /// Bucket holding transcoded variants
    pub output_bucket: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            redis_url: "redis://localhost:6379".to_string(),
            upload_bucket: "vtx-uploads".to_string(),
            output_bucket: "vtx-videos".to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB, the API only takes JSON
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            upload_bucket: std::env::var("SOURCE_BUCKET").unwrap_or(defaults.upload_bucket),
            output_bucket: std::env::var("OUTPUT_BUCKET").unwrap_or(defaults.output_bucket),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert!(!config.is_production());
    }

    #[test]
    fn test_is_production_case_insensitive() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
    }
}
