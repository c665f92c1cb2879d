use crate::persistence::ProductModel;
use crate::repository::{NewProduct, ProductChanges, ProductRepository};
use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// 1x1 transparent PNG.
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

pub(crate) const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
    0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub(crate) const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

pub(crate) async fn sqlite_memory_db() -> Arc<DatabaseConnection> {
    // A single connection keeps every query on the same in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

/// Sorted names of the files directly under `dir`. A missing directory is empty.
pub(crate) fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub(crate) struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub(crate) fn new() -> Self {
        Self {
            boundary: "product-api-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub(crate) fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub(crate) fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Returns the `Content-Type` header value and the encoded body.
    pub(crate) fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

/// Repository double whose writes can be switched to fail.
#[derive(Default)]
pub(crate) struct InMemoryProductRepository {
    rows: Mutex<Vec<ProductModel>>,
    fail_writes: AtomicBool,
}

impl InMemoryProductRepository {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub(crate) fn stored(&self, id: i32) -> Option<ProductModel> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id == id)
            .cloned()
    }

    fn check_writable(&self) -> Result<(), DbErr> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(DbErr::Custom("database is locked".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list_ordered_by_created_desc(&self) -> Result<Vec<ProductModel>, DbErr> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn find(&self, id: i32) -> Result<Option<ProductModel>, DbErr> {
        Ok(self.stored(id))
    }

    async fn create(&self, product: NewProduct) -> Result<ProductModel, DbErr> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let model = ProductModel {
            id: rows.iter().map(|row| row.id).max().unwrap_or(0) + 1,
            name: product.name,
            description: product.description,
            price: product.price,
            image: product.image,
            created_at: now.into(),
            updated_at: now.into(),
        };
        rows.push(model.clone());
        Ok(model)
    }

    async fn update(
        &self,
        existing: ProductModel,
        changes: ProductChanges,
    ) -> Result<ProductModel, DbErr> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == existing.id)
            .ok_or(DbErr::RecordNotUpdated)?;
        row.name = changes.name;
        row.description = changes.description;
        row.price = changes.price;
        if let Some(image) = changes.image {
            row.image = image;
        }
        row.updated_at = Utc::now().into();
        Ok(row.clone())
    }

    async fn delete(&self, id: i32) -> Result<bool, DbErr> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }
}
