pub mod availability;
pub mod line;
pub mod memory;
pub mod product;
pub mod repository;

pub use availability::{AvailabilityChecker, Purchasable};
pub use line::{CartLine, CartLineInput, ItemRef};
pub use memory::InMemoryCatalog;
pub use product::{Bundle, Product};
pub use repository::CatalogRepository;
