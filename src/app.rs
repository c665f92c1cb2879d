use crate::config::Settings;
use crate::handler::api_router;
use crate::repository::SeaOrmProductRepository;
use crate::service::product_service::{PUBLIC_IMAGE_SEGMENT, ProductService, ProductServiceOptions};
use crate::storage::LocalImageStore;
use common_http_server::{AppBuilder, AppConfig, ConfigError, Server, init_logging};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

/// Compose the HTTP application: JSON API under `/api`, uploaded images
/// served as static files under `/products`.
pub(crate) fn build_app(settings: &Settings, service: ProductService) -> AppBuilder {
    let app_config = AppConfig::new()
        .with_logging(true)
        .with_tracing(true)
        .with_cors_config(settings.cors.clone())
        .with_logging_config(settings.logging.clone());

    let image_dir = settings.image_dir.clone();
    let static_images = ServeDir::new(&settings.image_dir);

    AppBuilder::new(app_config)
        .nest("/api", api_router(service, settings.max_request_body_bytes))
        .nest_service(&format!("/{PUBLIC_IMAGE_SEGMENT}"), static_images)
        .startup_validation(move || {
            if image_dir.is_dir() {
                Ok(())
            } else {
                Err(ConfigError::Startup(format!(
                    "image directory {} is missing",
                    image_dir.display()
                )))
            }
        })
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env()?;
    init_logging(&settings.logging)?;

    let images = LocalImageStore::open(&settings.image_dir).await?;
    settings.image_dir = images.root().to_path_buf();

    let db = Database::connect(&settings.database_url).await?;
    Migrator::up(&db, None).await?;
    info!(
        database_url = %settings.database_url,
        image_dir = %images.root().display(),
        delete_image_on_destroy = settings.delete_image_on_destroy,
        "storage ready"
    );

    let service = ProductService::new(
        Arc::new(SeaOrmProductRepository::new(Arc::new(db))),
        Arc::new(images),
        ProductServiceOptions {
            public_base_url: settings.app_url.clone(),
            delete_image_on_destroy: settings.delete_image_on_destroy,
        },
    );

    let app_builder = build_app(&settings, service);
    Server::new(settings.server.clone(), app_builder).start().await?;
    Ok(())
}
