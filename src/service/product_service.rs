use crate::persistence::ProductModel;
use crate::repository::{NewProduct, ProductChanges, ProductRepository};
use crate::service::error::{ServiceError, map_db_error, map_io_error};
use crate::service::validation::{ImageRule, ProductInput, validate_product};
use crate::storage::{ImageStore, StoredImage};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

pub(crate) const PUBLIC_IMAGE_SEGMENT: &str = "products";

const LIST_FAILED: &str = "Failed to fetch products";
const SHOW_FAILED: &str = "Failed to fetch product";
const CREATE_FAILED: &str = "Failed to create product";
const UPDATE_FAILED: &str = "Failed to update product";
const DELETE_FAILED: &str = "Failed to delete product";

#[derive(Debug, Clone)]
pub(crate) struct ProductServiceOptions {
    /// Base URL that serves `/products/<filename>`.
    pub(crate) public_base_url: String,
    /// Also delete the image file when a product is destroyed.
    pub(crate) delete_image_on_destroy: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CreatedProduct {
    pub(crate) product: ProductModel,
    pub(crate) file_path: PathBuf,
}

#[derive(Clone)]
pub(crate) struct ProductService {
    repository: Arc<dyn ProductRepository>,
    images: Arc<dyn ImageStore>,
    options: Arc<ProductServiceOptions>,
}

impl ProductService {
    pub(crate) fn new(
        repository: Arc<dyn ProductRepository>,
        images: Arc<dyn ImageStore>,
        options: ProductServiceOptions,
    ) -> Self {
        Self {
            repository,
            images,
            options: Arc::new(options),
        }
    }

    pub(crate) fn public_image_url(&self, filename: &str) -> String {
        format!(
            "{}/{PUBLIC_IMAGE_SEGMENT}/{filename}",
            self.options.public_base_url.trim_end_matches('/')
        )
    }

    fn with_public_image_url(&self, mut product: ProductModel) -> ProductModel {
        product.image = self.public_image_url(&product.image);
        product
    }

    async fn find_existing(
        &self,
        id: i32,
        context: &'static str,
    ) -> Result<ProductModel, ServiceError> {
        self.repository
            .find(id)
            .await
            .map_err(map_db_error(context))?
            .ok_or_else(|| ServiceError::product_not_found(id))
    }

    /// Best-effort removal of a file that no record references.
    async fn discard_image(&self, filename: &str) {
        if let Err(error) = self.images.remove(filename).await {
            warn!(filename, error = %error, "failed to remove unreferenced image");
        }
    }

    pub(crate) async fn list(&self) -> Result<Vec<ProductModel>, ServiceError> {
        let products = self
            .repository
            .list_ordered_by_created_desc()
            .await
            .map_err(map_db_error(LIST_FAILED))?;

        Ok(products
            .into_iter()
            .map(|product| self.with_public_image_url(product))
            .collect())
    }

    pub(crate) async fn get(&self, id: i32) -> Result<ProductModel, ServiceError> {
        let product = self.find_existing(id, SHOW_FAILED).await?;
        Ok(self.with_public_image_url(product))
    }

    pub(crate) async fn create(&self, input: ProductInput) -> Result<CreatedProduct, ServiceError> {
        let valid = validate_product(input, ImageRule::Required).map_err(ServiceError::Validation)?;
        let image = valid
            .image
            .ok_or_else(|| ServiceError::internal(CREATE_FAILED, "validated image is missing"))?;

        let stored = self
            .images
            .save(&image)
            .await
            .map_err(map_io_error(CREATE_FAILED))?;

        let new_product = NewProduct {
            name: valid.name,
            description: valid.description,
            price: valid.price,
            image: stored.filename.clone(),
        };

        match self.repository.create(new_product).await {
            Ok(product) => {
                info!(id = product.id, image = %product.image, "product created");
                Ok(CreatedProduct {
                    product,
                    file_path: stored.path,
                })
            }
            Err(error) => {
                self.discard_image(&stored.filename).await;
                Err(map_db_error(CREATE_FAILED)(error))
            }
        }
    }

    pub(crate) async fn update(
        &self,
        id: i32,
        input: ProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let existing = self.find_existing(id, UPDATE_FAILED).await?;
        let valid = validate_product(input, ImageRule::Optional).map_err(ServiceError::Validation)?;

        let replacement: Option<StoredImage> = match &valid.image {
            Some(image) => Some(
                self.images
                    .save(image)
                    .await
                    .map_err(map_io_error(UPDATE_FAILED))?,
            ),
            None => None,
        };

        let previous_image = existing.image.clone();
        let changes = ProductChanges {
            name: valid.name,
            description: valid.description,
            price: valid.price,
            image: replacement.as_ref().map(|stored| stored.filename.clone()),
        };

        let updated = match self.repository.update(existing, changes).await {
            Ok(updated) => updated,
            Err(error) => {
                if let Some(stored) = &replacement {
                    self.discard_image(&stored.filename).await;
                }
                return Err(map_db_error(UPDATE_FAILED)(error));
            }
        };

        if replacement.is_some() {
            match self.images.remove(&previous_image).await {
                Ok(true) => info!(id, image = %previous_image, "previous product image removed"),
                Ok(false) => {}
                Err(error) => warn!(
                    id,
                    image = %previous_image,
                    error = %error,
                    "failed to remove previous product image"
                ),
            }
        }

        info!(id, image = %updated.image, "product updated");
        Ok(updated)
    }

    pub(crate) async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_existing(id, DELETE_FAILED).await?;

        let removed = self
            .repository
            .delete(id)
            .await
            .map_err(map_db_error(DELETE_FAILED))?;
        if !removed {
            return Err(ServiceError::product_not_found(id));
        }

        if self.options.delete_image_on_destroy {
            self.discard_image(&existing.image).await;
        }

        info!(
            id,
            image = %existing.image,
            image_removed = self.options.delete_image_on_destroy,
            "product deleted"
        );
        Ok(())
    }
}
