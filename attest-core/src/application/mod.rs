// attest-core/src/application/mod.rs

pub mod exceptions;
pub mod reporting;
pub mod resolution;
pub mod validation;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use attest_core::application::{run_validation, resolve_lookups, ...};`
// sans avoir à connaître la structure interne des fichiers.

pub use exceptions::ExceptionTracker;
pub use reporting::{freeze_snapshot, generate_all_reports, generate_report};
pub use resolution::{ResolutionOptions, ResolutionOutcome, resolve_lookups};
pub use validation::{ValidationRun, run_validation, run_validation_with_mapping};
