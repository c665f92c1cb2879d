pub(crate) mod product_repository;

pub(crate) use product_repository::{
    NewProduct, ProductChanges, ProductRepository, SeaOrmProductRepository,
};
