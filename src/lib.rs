pub mod compare;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod grading;
pub mod languages;
pub mod scratch;
pub mod timer;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::GraderConfig;
pub use error::{GraderError, GraderResult};
pub use executor::Executor;
pub use grading::GradingRunner;
pub use languages::{Language, LanguageConfig, LanguageRegistry};
pub use types::*;
