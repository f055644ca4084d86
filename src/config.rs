use std::collections::HashMap;
use thiserror::Error;

/// Process-level configuration loaded from the environment.
///
/// Business configuration that must be mutable at runtime (commission rates,
/// bonus tables, channel limits) lives in the database and is read
/// transactionally at the point of use, never here.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    /// Optional fire-and-forget webhook sink for player notifications.
    pub notify_webhook_url: Option<String>,
    /// Canonical timezone offset (minutes east of UTC) for calendar-day
    /// logic in the daily login bonus. Default +05:30.
    pub bonus_utc_offset_minutes: i32,
    /// Interval for the background re-scan of waiting queue entries.
    pub pairing_rescan_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let jwt_secret = env_map
            .get("JWT_SECRET")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("JWT_SECRET".to_string()))?;

        let notify_webhook_url = env_map
            .get("NOTIFY_WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let bonus_utc_offset_minutes = env_map
            .get("BONUS_UTC_OFFSET_MINUTES")
            .map(|s| s.as_str())
            .unwrap_or("330")
            .parse::<i32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BONUS_UTC_OFFSET_MINUTES".to_string(),
                    "must be a valid i32".to_string(),
                )
            })?;
        if bonus_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue(
                "BONUS_UTC_OFFSET_MINUTES".to_string(),
                "must be within +/- 24 hours".to_string(),
            ));
        }

        let pairing_rescan_secs = env_map
            .get("PAIRING_RESCAN_SECS")
            .map(|s| s.as_str())
            .unwrap_or("30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PAIRING_RESCAN_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            jwt_secret,
            notify_webhook_url,
            bonus_utc_offset_minutes,
            pairing_rescan_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert("JWT_SECRET".to_string(), "secret".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_jwt_secret() {
        let mut env_map = setup_required_env();
        env_map.remove("JWT_SECRET");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "JWT_SECRET"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_default_bonus_offset_is_ist() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.bonus_utc_offset_minutes, 330);
    }

    #[test]
    fn test_out_of_range_bonus_offset_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("BONUS_UTC_OFFSET_MINUTES".to_string(), "1500".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BONUS_UTC_OFFSET_MINUTES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_webhook_url_treated_as_absent() {
        let mut env_map = setup_required_env();
        env_map.insert("NOTIFY_WEBHOOK_URL".to_string(), "  ".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.notify_webhook_url.is_none());
    }
}
