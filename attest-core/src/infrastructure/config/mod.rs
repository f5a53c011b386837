// attest-core/src/infrastructure/config/mod.rs

pub mod project;
pub mod schema;

pub use project::{DirectoryConfig, ProjectConfig, ResolverConfig, load_project_config};
pub use schema::SchemaAdapter;
