pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog::{Catalog, CatalogError, RecommendationRequest};
pub use domain::order::{normalize_order_number, Order};
pub use domain::product::Product;
pub use domain::promotion::Promotion;
pub use errors::{ApplicationError, DomainError, InterfaceError};
