//! Logging initialization and request logging middleware.

use axum::{
    extract::Request as AxumRequest,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{
    OnceLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;
static JSON_LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub include_target: bool,
    pub include_thread_ids: bool,
    pub include_source_location: bool,
    /// JSON-lines file that receives a copy of every event.
    pub json_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            include_target: false,
            include_thread_ids: false,
            include_source_location: false,
            json_file: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_json_file(mut self, path: Option<PathBuf>) -> Self {
        self.json_file = path;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn is_valid_request_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b':'))
}

fn normalized_request_id(candidate: Option<&str>) -> String {
    if let Some(raw) = candidate {
        let trimmed = raw.trim();
        if is_valid_request_id(trimmed) {
            return trimmed.to_string();
        }
    }

    uuid::Uuid::new_v4().to_string()
}

/// 初始化日志系统
///
/// `RUST_LOG` selects the filter (default `info`). Only the first call
/// installs anything; later calls return immediately without opening writers.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    if SUBSCRIBER_INSTALLED.load(Ordering::Acquire) {
        debug!("Logging already initialized");
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let terminal_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_ids)
            .with_file(config.include_source_location)
            .with_line_number(config.include_source_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_ids)
            .with_file(config.include_source_location)
            .with_line_number(config.include_source_location)
            .boxed(),
    };

    let file_layer = match &config.json_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(config.include_target)
                .with_thread_ids(config.include_thread_ids)
                .with_file(config.include_source_location)
                .with_line_number(config.include_source_location)
                .with_writer(build_json_file_writer(path)?)
                .boxed(),
        ),
        None => None,
    };

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(terminal_layer)
        .with(file_layer)
        .try_init();

    if let Err(err) = init_result {
        // Tests and embedding binaries may have installed a subscriber already.
        if err.to_string().contains("already been set") {
            SUBSCRIBER_INSTALLED.store(true, Ordering::Release);
            return Ok(());
        }
        return Err(Box::new(err));
    }
    SUBSCRIBER_INSTALLED.store(true, Ordering::Release);

    info!(format = ?config.format, json_file = ?config.json_file, "Logging system initialized");
    Ok(())
}

fn build_json_file_writer(
    path: &Path,
) -> Result<tracing_appender::non_blocking::NonBlocking, Box<dyn std::error::Error>> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "json log path must contain a file name",
        )
    })?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = JSON_LOG_GUARD.set(guard);
    Ok(non_blocking)
}

/// 结构化日志中间件
///
/// Propagates a valid incoming `x-request-id` (or generates one), exposes it
/// to handlers as a [`RequestId`] extension and echoes it on the response.
pub async fn structured_logging_middleware(mut request: AxumRequest, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request_id = normalized_request_id(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok()),
    );
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    debug!(request_id = %request_id, method = %method, path = %path, "Request started");

    let mut response = next.run(request).await;
    let duration_ms = start_time.elapsed().as_millis();
    let status = response.status();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    if status.is_server_error() {
        error!(request_id = %request_id, method = %method, path = %path, status = %status, duration_ms, "Server error");
    } else if status.is_client_error() {
        warn!(request_id = %request_id, method = %method, path = %path, status = %status, duration_ms, "Client error");
    } else {
        info!(request_id = %request_id, method = %method, path = %path, status = %status, duration_ms, "Request completed");
    }

    response
}
