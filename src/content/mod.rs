pub mod cache;
pub mod contentful;
pub mod data;
