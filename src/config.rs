use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the browser client).
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// bcrypt work factor used when hashing new passwords.
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds between replenished requests (per IP) for register/login
    pub auth_per_second: u32,
    /// Burst size for register/login
    pub auth_burst: u32,
}

impl Config {
    /// Read the process environment. The binary loads `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "5001".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/taskboard.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "240".to_string())
                    .parse()
                    .unwrap_or(240),
            },
            auth: AuthConfig {
                bcrypt_cost: match env::var("BCRYPT_COST") {
                    Ok(v) => {
                        let cost: u32 = v
                            .parse()
                            .map_err(|_| ConfigError::InvalidValue("BCRYPT_COST".to_string()))?;
                        if !(4..=31).contains(&cost) {
                            return Err(ConfigError::InvalidValue("BCRYPT_COST".to_string()));
                        }
                        cost
                    }
                    Err(_) => bcrypt::DEFAULT_COST,
                },
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                frontend_url: "http://localhost:5173".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/taskboard.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 240,
            },
            auth: AuthConfig {
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test touching the process environment, so nothing races on it.
    #[test]
    fn from_env_reads_variables_and_rejects_bad_values() {
        env::set_var("JWT_SECRET", "from-the-environment");
        env::set_var("PORT", "8123");
        env::set_var("BCRYPT_COST", "6");

        let config = Config::from_env().unwrap();
        assert_eq!(config.jwt.secret, "from-the-environment");
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.auth.bcrypt_cost, 6);

        env::set_var("BCRYPT_COST", "99");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(name)) if name == "BCRYPT_COST"
        ));

        env::remove_var("JWT_SECRET");
        env::remove_var("BCRYPT_COST");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingEnv(name)) if name == "JWT_SECRET"
        ));
        env::remove_var("PORT");
    }
}
