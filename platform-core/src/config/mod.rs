use crate::error::AppError;
use std::env;

/// Settings shared by every service binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::Config(anyhow::anyhow!("invalid PORT: {}", e)))?,
            Err(_) => 8080,
        };

        if port == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        Ok(Self { port })
    }
}
