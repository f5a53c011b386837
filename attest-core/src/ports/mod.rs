pub mod directory;

pub use directory::{Candidate, Directory};
