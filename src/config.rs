use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_IMAGE_UPLOAD_MB: usize = 5;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub max_image_upload_mb: usize,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn require_absolute(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        require_absolute("DATABASE_PATH", &database_path)?;
        require_absolute("MEDIA_PATH", &media_path)?;

        // 128 hex characters decode to the 64-byte key the cookie store needs.
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
            ));
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let max_image_upload_mb = match env::var("MAX_IMAGE_UPLOAD_MB") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                _ => {
                    return Err(config::ConfigError::Message(format!(
                        "FATAL: 'MAX_IMAGE_UPLOAD_MB' must be a positive whole number, got '{}'.",
                        raw
                    )))
                }
            },
            Err(_) => DEFAULT_MAX_IMAGE_UPLOAD_MB,
        };

        let builder = config::Config::builder()
            // Web host and port live in the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("max_image_upload_mb", max_image_upload_mb as u64)?
            .build()?;

        builder.try_deserialize()
    }

    /// Full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blog").join("blog.db")
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_upload_mb * 1024 * 1024
    }
}
