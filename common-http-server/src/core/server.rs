//! Server bootstrap and runtime configuration.
//!
//! `AppBuilder -> Server::new(...) -> Server::start()` binds the configured
//! address and runs until Ctrl+C or SIGTERM. `Server::serve` takes an
//! already bound listener and an arbitrary shutdown future instead.

use crate::core::{
    app::AppBuilder,
    cors::CorsConfig,
    logging::{LoggingConfig, init_logging, structured_logging_middleware},
};
use axum::{Router, middleware};
use std::{future::Future, io, net::SocketAddr};
use tokio::net::TcpListener;
use tracing::{error, info};

pub(crate) type StartupValidation =
    Box<dyn Fn() -> Result<(), ConfigError> + Send + Sync + 'static>;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Reads `SERVER_HOST` and `SERVER_PORT`; unset or blank values keep the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("SERVER_HOST").filter(|host| !host.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("SERVER_PORT").filter(|port| !port.trim().is_empty()) {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "SERVER_PORT",
                value: port.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port).parse().map_err(|_| {
            ConfigError::InvalidSocketAddress {
                host: self.host.clone(),
                port: self.port,
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // 端口 0 会触发系统随机端口分配，这里要求显式配置固定端口
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                port: self.port,
                min: 1,
                max: u16::MAX,
            });
        }
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        self.address().map(|_| ())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub enable_cors: bool,
    pub enable_tracing: bool,
    pub enable_logging: bool,
    pub cors_config: Option<CorsConfig>,
    pub logging_config: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Replace the allow-all default policy. Also turns CORS on.
    pub fn with_cors_config(mut self, config: CorsConfig) -> Self {
        self.cors_config = Some(config);
        self.enable_cors = true;
        self
    }

    pub fn with_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = enable;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_logging_config(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self
    }

    /// The effective CORS policy, `None` when CORS is disabled.
    pub fn get_cors_config(&self) -> Option<CorsConfig> {
        self.enable_cors
            .then(|| self.cors_config.clone().unwrap_or_default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.get_cors_config() {
            Some(cors_config) => cors_config.validate(),
            None => Ok(()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            enable_tracing: true,
            enable_logging: true,
            cors_config: None,
            logging_config: LoggingConfig::default(),
        }
    }
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port {port}: must be between {min} and {max}")]
    InvalidPort { port: u16, min: u16, max: u16 },
    #[error("Empty host address")]
    EmptyHost,
    #[error("Invalid socket address: {host}:{port}")]
    InvalidSocketAddress { host: String, port: u16 },
    #[error("Invalid CORS configuration: {0}")]
    InvalidCors(String),
    #[error("Empty allowed origins")]
    EmptyAllowedOrigins,
    #[error("Empty allowed methods")]
    EmptyAllowedMethods,
    #[error("Empty allowed headers")]
    EmptyAllowedHeaders,
    #[error("Credentials cannot be combined with a `*` CORS entry")]
    CredentialsWithWildcard,
    #[error("Invalid value for {name}: `{value}`")]
    InvalidEnv { name: &'static str, value: String },
    #[error("Startup check failed: {0}")]
    Startup(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// HTTP 服务器
pub struct Server {
    server_config: ServerConfig,
    app_builder: AppBuilder,
}

impl Server {
    pub fn new(server_config: ServerConfig, app_builder: AppBuilder) -> Self {
        Self {
            server_config,
            app_builder,
        }
    }

    /// 启动服务器，直到收到 Ctrl+C 或 SIGTERM
    pub async fn start(self) -> Result<(), ServerError> {
        let app_config = self.app_builder.app_config().clone();
        if app_config.enable_logging {
            init_logging(&app_config.logging_config)
                .map_err(|e| ServerError::Logging(e.to_string()))?;
        }

        self.server_config.validate()?;
        let app = self.app_builder.into_router()?;

        let addr = self.server_config.address()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(
            host = %self.server_config.host,
            port = self.server_config.port,
            cors_enabled = app_config.enable_cors,
            "Server starting on http://{addr}"
        );

        serve_router(listener, app, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves. Logging is not
    /// initialised here; the configured host and port are ignored.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.app_builder.into_router()?;
        info!(addr = %listener.local_addr()?, "Server listening");
        serve_router(listener, app, shutdown).await
    }
}

async fn serve_router<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Server stopped");
    Ok(())
}

pub(crate) fn apply_app_layers(mut router: Router, config: &AppConfig) -> Router {
    if config.enable_logging {
        router = router.layer(middleware::from_fn(structured_logging_middleware));
    }

    if config.enable_tracing {
        router = router.layer(tower_http::trace::TraceLayer::new_for_http());
    }

    // Outermost, so preflight requests are answered before reaching the routes.
    if let Some(cors_config) = config.get_cors_config() {
        router = router.layer(cors_config.build_layer());
    }

    router
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };

    info!(signal, "Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(matches!(
            ServerConfig::new(0).validate(),
            Err(ConfigError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn unparsable_host_is_rejected() {
        let config = ServerConfig::new(8000).with_host("not a host");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSocketAddress { .. })
        ));
    }

    #[test]
    fn lookup_overrides_host_and_port() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("SERVER_HOST", "0.0.0.0"), ("SERVER_PORT", "9000")]))
                .unwrap();
        assert_eq!(config, ServerConfig::new(9000).with_host("0.0.0.0"));

        let defaults = ServerConfig::from_lookup(lookup_from(&[("SERVER_PORT", " ")])).unwrap();
        assert_eq!(defaults, ServerConfig::default());
    }

    #[test]
    fn lookup_rejects_non_numeric_port() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup_from(&[("SERVER_PORT", "http")])),
            Err(ConfigError::InvalidEnv { name: "SERVER_PORT", .. })
        ));
    }

    #[test]
    fn disabled_cors_yields_no_policy() {
        let config = AppConfig::new().with_cors(false);
        assert!(config.get_cors_config().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_cors_policy_fails_app_validation() {
        let config = AppConfig::new()
            .with_cors_config(CorsConfig::new().allow_credentials(true));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CredentialsWithWildcard)
        ));
    }

    #[tokio::test]
    async fn serves_health_over_tcp_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app_builder = AppBuilder::new(AppConfig::new().with_logging(false).with_tracing(false));
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(Server::new(ServerConfig::default(), app_builder).serve(
            listener,
            async move {
                let _ = stopped.await;
            },
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.starts_with("HTTP/1.1 200"), "{text}");
        assert!(text.contains("Service is running"));

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn serve_refuses_invalid_app_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app_builder = AppBuilder::new(
            AppConfig::new()
                .with_logging(false)
                .with_cors_config(CorsConfig::new().allowed_origins(vec![])),
        );

        let result = Server::new(ServerConfig::default(), app_builder)
            .serve(listener, std::future::ready(()))
            .await;

        assert!(matches!(
            result,
            Err(ServerError::Config(ConfigError::EmptyAllowedOrigins))
        ));
    }
}
