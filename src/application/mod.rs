pub mod error;
pub mod pagination;
pub mod photos;
pub mod repos;
