//! `common-http-server` provides a reusable Axum-based HTTP server scaffold:
//! bootstrap (`Server`, `ServerConfig`, `AppBuilder`, `AppConfig`), a CORS
//! policy, the `{message, data}` JSON envelope and structured request logging.

pub mod core;

pub use core::{
    ApiResponse, AppBuilder, AppConfig, ConfigError, CorsConfig, FieldErrors, HealthResponse,
    LogFormat, LoggingConfig, REQUEST_ID_HEADER, RequestId, Server, ServerConfig, ServerError,
    health_check, init_logging, structured_logging_middleware,
};
