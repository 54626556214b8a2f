//! Suite documents: model, expected-value matchers and loading

pub mod document;
pub mod loader;
pub mod matcher;

pub use document::{FunctionRef, SpecDeclaration, SuiteDocument};
pub use loader::{load_document, LoadedSuite, SuiteDependency, Target};
pub use matcher::Matcher;
