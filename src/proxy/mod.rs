//! Proxy internals: upstream token lifecycle, query sanitisation,
//! response redaction, error projection and schema learning.

pub mod error_mapper;
pub mod learner;
pub mod redact;
pub mod sanitize;
pub mod token_manager;

pub use learner::SchemaLearner;
pub use token_manager::TokenManager;
