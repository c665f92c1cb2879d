use crate::service::validation::ValidImage;
use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredImage {
    pub(crate) filename: String,
    pub(crate) path: PathBuf,
}

/// Location for product images, addressed by bare filename only.
#[async_trait]
pub(crate) trait ImageStore: Send + Sync {
    async fn ensure_dir(&self) -> io::Result<()>;

    /// Write the image under a freshly generated, collision-free filename.
    async fn save(&self, image: &ValidImage) -> io::Result<StoredImage>;

    /// Delete a stored image. A missing file is `Ok(false)`.
    async fn remove(&self, filename: &str) -> io::Result<bool>;

    fn path_for(&self, filename: &str) -> io::Result<PathBuf>;
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && Path::new(filename).file_name().is_some_and(|name| name == filename)
}

#[derive(Debug, Clone)]
pub(crate) struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if needed and anchor the store at its absolute path.
    pub(crate) async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let store = Self::new(root);
        store.ensure_dir().await?;

        match tokio::fs::canonicalize(&store.root).await {
            Ok(resolved) => Ok(Self::new(resolved)),
            Err(_) => Ok(store),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn generate_filename(image: &ValidImage) -> String {
        format!("{}.{}", Uuid::new_v4().simple(), image.format.extension())
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn ensure_dir(&self) -> io::Result<()> {
        if tokio::fs::try_exists(&self.root).await? {
            let metadata = tokio::fs::metadata(&self.root).await?;
            if !metadata.is_dir() {
                return Err(io::Error::other(format!(
                    "image storage path is not a directory: {}",
                    self.root.display()
                )));
            }
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root).await.map_err(|error| {
            io::Error::new(
                error.kind(),
                format!(
                    "failed to create image directory {}: {error}",
                    self.root.display()
                ),
            )
        })
    }

    async fn save(&self, image: &ValidImage) -> io::Result<StoredImage> {
        self.ensure_dir().await?;

        let filename = Self::generate_filename(image);
        let path = self.root.join(&filename);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&image.bytes).await?;
        file.flush().await?;

        tracing::debug!(
            filename = %filename,
            original = ?image.original_filename,
            bytes = image.bytes.len(),
            "image stored"
        );

        Ok(StoredImage { filename, path })
    }

    async fn remove(&self, filename: &str) -> io::Result<bool> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn path_for(&self, filename: &str) -> io::Result<PathBuf> {
        if !is_plain_filename(filename) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid image filename `{filename}`"),
            ));
        }
        Ok(self.root.join(filename))
    }
}
