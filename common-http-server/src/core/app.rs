//! Application router builder.
//!
//! `AppBuilder` only composes routes. Logging, tracing and CORS layers are
//! applied when the builder is turned into a router.

use crate::core::{
    health::health_check,
    response::ApiResponse,
    server::{AppConfig, ConfigError, StartupValidation, apply_app_layers},
};
use axum::{
    Router,
    http::StatusCode,
    routing::get,
};
use serde_json::Value;
use std::convert::Infallible;
use tower::Service;

/// 应用构建器
pub struct AppBuilder {
    router: Router,
    app_config: AppConfig,
    startup_validations: Vec<StartupValidation>,
}

impl AppBuilder {
    pub fn new(app_config: AppConfig) -> Self {
        Self {
            router: Router::new().route("/health", get(health_check)),
            app_config,
            startup_validations: Vec::new(),
        }
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    /// 嵌套路由
    pub fn nest(mut self, path: &str, router: Router) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Mount a tower service (for example a static file server) under `path`.
    pub fn nest_service<S>(mut self, path: &str, service: S) -> Self
    where
        S: Service<axum::extract::Request, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: axum::response::IntoResponse,
        S::Future: Send + 'static,
    {
        self.router = self.router.nest_service(path, service);
        self
    }

    /// Register a check that runs before the server socket is bound.
    pub fn startup_validation<F>(mut self, validation: F) -> Self
    where
        F: Fn() -> Result<(), ConfigError> + Send + Sync + 'static,
    {
        self.startup_validations.push(Box::new(validation));
        self
    }

    pub(crate) fn into_parts(self) -> (Router, AppConfig, Vec<StartupValidation>) {
        (
            self.router.fallback(fallback_handler),
            self.app_config,
            self.startup_validations,
        )
    }

    /// Validate the configuration, run startup checks and return the final
    /// router with every runtime layer applied.
    pub fn into_router(self) -> Result<Router, ConfigError> {
        let (router, app_config, startup_validations) = self.into_parts();

        app_config.validate()?;
        for startup_validation in startup_validations {
            startup_validation()?;
        }

        Ok(apply_app_layers(router, &app_config))
    }
}

async fn fallback_handler() -> ApiResponse<Value> {
    ApiResponse::error_with_status("Not Found", "Endpoint not found", StatusCode::NOT_FOUND)
}
