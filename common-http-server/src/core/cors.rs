//! CORS policy configuration.
//!
//! The default policy allows every origin, method and header, exposes no
//! headers, does not support credentials and disables preflight caching.
//! A `"*"` entry in any list maps to `tower_http::cors::Any`.

use crate::core::server::ConfigError;
use axum::http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

const WILDCARD: &str = "*";

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorsConfig {
    /// 允许的源
    pub allowed_origins: Vec<String>,
    /// 允许的方法
    pub allowed_methods: Vec<String>,
    /// 允许的头
    pub allowed_headers: Vec<String>,
    /// 暴露的头
    pub exposed_headers: Vec<String>,
    /// 是否允许凭证
    pub allow_credentials: bool,
    /// 预检请求缓存时间（秒），`None` 表示不发送该头
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![WILDCARD.to_string()],
            allowed_methods: vec![WILDCARD.to_string()],
            allowed_headers: vec![WILDCARD.to_string()],
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: Some(0),
        }
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|value| value.trim() == WILDCARD)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn header_names(values: &[String]) -> Vec<HeaderName> {
    values
        .iter()
        .filter_map(|value| HeaderName::from_str(value.trim()).ok())
        .collect()
}

impl CorsConfig {
    /// 创建默认（全部放行）的 CORS 配置
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allowed_origins(mut self, origins: Vec<&str>) -> Self {
        self.allowed_origins = origins.into_iter().map(str::to_string).collect();
        self
    }

    pub fn allowed_methods(mut self, methods: Vec<&str>) -> Self {
        self.allowed_methods = methods.into_iter().map(str::to_string).collect();
        self
    }

    pub fn allowed_headers(mut self, headers: Vec<&str>) -> Self {
        self.allowed_headers = headers.into_iter().map(str::to_string).collect();
        self
    }

    pub fn exposed_headers(mut self, headers: Vec<&str>) -> Self {
        self.exposed_headers = headers.into_iter().map(str::to_string).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    /// 构建 CORS 层。调用前应先通过 [`CorsConfig::validate`]。
    pub fn build_layer(&self) -> CorsLayer {
        let origin = if is_wildcard(&self.allowed_origins) {
            AllowOrigin::from(Any)
        } else {
            let origins: Vec<HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
                .collect();
            AllowOrigin::list(origins)
        };

        let methods = if is_wildcard(&self.allowed_methods) {
            AllowMethods::from(Any)
        } else {
            let methods: Vec<Method> = self
                .allowed_methods
                .iter()
                .filter_map(|method| method.trim().to_ascii_uppercase().parse().ok())
                .collect();
            AllowMethods::list(methods)
        };

        let headers = if is_wildcard(&self.allowed_headers) {
            AllowHeaders::from(Any)
        } else {
            AllowHeaders::list(header_names(&self.allowed_headers))
        };

        let mut cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers);

        if is_wildcard(&self.exposed_headers) {
            cors = cors.expose_headers(ExposeHeaders::from(Any));
        } else if !self.exposed_headers.is_empty() {
            cors = cors.expose_headers(ExposeHeaders::list(header_names(&self.exposed_headers)));
        }

        if self.allow_credentials {
            cors = cors.allow_credentials(true);
        }

        if let Some(max_age) = self.max_age {
            cors = cors.max_age(Duration::from_secs(max_age));
        }

        tracing::debug!(
            origins = ?self.allowed_origins,
            credentials = self.allow_credentials,
            max_age = ?self.max_age,
            "CORS layer built"
        );

        cors
    }

    /// 验证 CORS 配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_origins.is_empty() {
            return Err(ConfigError::EmptyAllowedOrigins);
        }
        if self.allowed_methods.is_empty() {
            return Err(ConfigError::EmptyAllowedMethods);
        }
        if self.allowed_headers.is_empty() {
            return Err(ConfigError::EmptyAllowedHeaders);
        }

        // Browsers reject `*` together with credentials, and tower-http panics on it.
        if self.allow_credentials
            && [
                &self.allowed_origins,
                &self.allowed_methods,
                &self.allowed_headers,
                &self.exposed_headers,
            ]
            .into_iter()
            .any(|values| is_wildcard(values))
        {
            return Err(ConfigError::CredentialsWithWildcard);
        }

        if !is_wildcard(&self.allowed_origins) {
            for origin in &self.allowed_origins {
                HeaderValue::from_str(origin.trim())
                    .map_err(|_| ConfigError::InvalidCors(format!("invalid origin `{origin}`")))?;
            }
        }

        if !is_wildcard(&self.allowed_methods) {
            for method in &self.allowed_methods {
                Method::from_str(&method.trim().to_ascii_uppercase())
                    .map_err(|_| ConfigError::InvalidCors(format!("invalid method `{method}`")))?;
            }
        }

        for header in self.allowed_headers.iter().chain(&self.exposed_headers) {
            if header.trim() != WILDCARD && HeaderName::from_str(header.trim()).is_err() {
                return Err(ConfigError::InvalidCors(format!("invalid header `{header}`")));
            }
        }

        Ok(())
    }

    /// 从环境变量加载配置，未设置的项保持默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            config.allowed_origins = split_list(&origins);
        }
        if let Some(methods) = lookup("CORS_ALLOWED_METHODS") {
            config.allowed_methods = split_list(&methods);
        }
        if let Some(headers) = lookup("CORS_ALLOWED_HEADERS") {
            config.allowed_headers = split_list(&headers);
        }
        if let Some(exposed) = lookup("CORS_EXPOSED_HEADERS") {
            config.exposed_headers = split_list(&exposed);
        }
        if let Some(credentials) = lookup("CORS_ALLOW_CREDENTIALS") {
            config.allow_credentials = credentials.trim().parse().map_err(|_| {
                ConfigError::InvalidEnv {
                    name: "CORS_ALLOW_CREDENTIALS",
                    value: credentials.clone(),
                }
            })?;
        }
        if let Some(max_age) = lookup("CORS_MAX_AGE") {
            let trimmed = max_age.trim();
            config.max_age = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: "CORS_MAX_AGE",
                    value: max_age.clone(),
                })?)
            };
        }

        Ok(config)
    }
}
