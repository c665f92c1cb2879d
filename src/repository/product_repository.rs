use crate::persistence::{ProductActiveModel, ProductColumn, ProductEntity, ProductModel};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryOrder,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewProduct {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) price: f64,
    pub(crate) image: String,
}

/// Field values written by an update. `image` stays untouched when `None`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProductChanges {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) price: f64,
    pub(crate) image: Option<String>,
}

/// Storage for product rows. Timestamps are maintained by the implementation.
#[async_trait]
pub(crate) trait ProductRepository: Send + Sync {
    async fn list_ordered_by_created_desc(&self) -> Result<Vec<ProductModel>, DbErr>;

    async fn find(&self, id: i32) -> Result<Option<ProductModel>, DbErr>;

    async fn create(&self, product: NewProduct) -> Result<ProductModel, DbErr>;

    async fn update(
        &self,
        existing: ProductModel,
        changes: ProductChanges,
    ) -> Result<ProductModel, DbErr>;

    /// Returns `false` when no row had the given id.
    async fn delete(&self, id: i32) -> Result<bool, DbErr>;
}

#[derive(Clone)]
pub(crate) struct SeaOrmProductRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmProductRepository {
    pub(crate) fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for SeaOrmProductRepository {
    async fn list_ordered_by_created_desc(&self) -> Result<Vec<ProductModel>, DbErr> {
        ProductEntity::find()
            .order_by_desc(ProductColumn::CreatedAt)
            .order_by_desc(ProductColumn::Id)
            .all(self.db.as_ref())
            .await
    }

    async fn find(&self, id: i32) -> Result<Option<ProductModel>, DbErr> {
        ProductEntity::find_by_id(id).one(self.db.as_ref()).await
    }

    async fn create(&self, product: NewProduct) -> Result<ProductModel, DbErr> {
        let now = Utc::now();
        let active_model = ProductActiveModel {
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            image: Set(product.image),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        active_model.insert(self.db.as_ref()).await
    }

    async fn update(
        &self,
        existing: ProductModel,
        changes: ProductChanges,
    ) -> Result<ProductModel, DbErr> {
        let mut active_model = existing.into_active_model();
        active_model.name = Set(changes.name);
        active_model.description = Set(changes.description);
        active_model.price = Set(changes.price);
        if let Some(image) = changes.image {
            active_model.image = Set(image);
        }
        active_model.updated_at = Set(Utc::now().into());

        active_model.update(self.db.as_ref()).await
    }

    async fn delete(&self, id: i32) -> Result<bool, DbErr> {
        let result = ProductEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
