mod product;

pub(crate) use crate::persistence::product::{
    ProductActiveModel, ProductColumn, ProductEntity, ProductModel,
};
