//! Process configuration read from the environment (after `.env` is loaded).

use common_http_server::{ConfigError, CorsConfig, LogFormat, LoggingConfig, ServerConfig};
use std::{path::PathBuf, str::FromStr};

const DEFAULT_DATABASE_URL: &str = "sqlite://products.db?mode=rwc";
const DEFAULT_IMAGE_DIR: &str = "public/products";
const DEFAULT_LOG_FILE: &str = "logs/product-api.jsonl";
const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) server: ServerConfig,
    pub(crate) database_url: String,
    /// Public base URL used when rewriting image filenames to links.
    pub(crate) app_url: String,
    pub(crate) image_dir: PathBuf,
    pub(crate) delete_image_on_destroy: bool,
    pub(crate) max_request_body_bytes: usize,
    pub(crate) logging: LoggingConfig,
    pub(crate) cors: CorsConfig,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(name)) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { name, value: raw }),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup(name)) else {
        return Ok(default);
    };

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value: raw }),
    }
}

impl Settings {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig::from_lookup(&lookup)?;

        let app_url = non_empty(lookup("APP_URL"))
            .unwrap_or_else(|| format!("http://{}:{}", server.host, server.port));

        let max_request_body_bytes = parse_var(
            &lookup,
            "MAX_REQUEST_BODY_BYTES",
            DEFAULT_MAX_REQUEST_BODY_BYTES,
        )?;
        if max_request_body_bytes == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "MAX_REQUEST_BODY_BYTES",
                value: "0".into(),
            });
        }

        // An explicitly empty LOG_FILE turns the file backend off.
        let json_file = match lookup("LOG_FILE") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(PathBuf::from(raw.trim())),
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };
        let logging = LoggingConfig::default()
            .with_format(parse_var(&lookup, "LOG_FORMAT", LogFormat::Pretty)?)
            .with_json_file(json_file);

        let cors = CorsConfig::from_lookup(&lookup)?;
        cors.validate()?;

        Ok(Self {
            server,
            database_url: non_empty(lookup("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            app_url,
            image_dir: non_empty(lookup("PRODUCT_IMAGE_DIR"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR)),
            delete_image_on_destroy: parse_flag(&lookup, "DELETE_IMAGE_ON_DESTROY", false)?,
            max_request_body_bytes,
            logging,
            cors,
        })
    }
}
