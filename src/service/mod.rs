pub(crate) mod error;
pub(crate) mod product_service;
pub(crate) mod validation;
