pub mod error;
pub mod lookup;
pub mod mapping;
pub mod ports;
pub mod report;
pub mod schema;
pub mod snapshot;
pub mod validate;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
