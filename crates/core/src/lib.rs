pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ids;
pub mod validation;

pub use catalog::Catalog;
pub use domain::product::{Product, ProductFields, ProductId, ProductPatch};
pub use domain::review::{Review, ReviewFields, ReviewId, ReviewPatch};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ids::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use validation::{FieldError, ProductInput, ReviewInput};
