mod entity;

pub(crate) use entity::{
    ActiveModel as ProductActiveModel, Column as ProductColumn, Entity as ProductEntity,
    Model as ProductModel,
};
