pub(crate) mod image_store;

pub(crate) use image_store::{ImageStore, LocalImageStore, StoredImage};
