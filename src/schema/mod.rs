//! Entity schemas and record validation.

mod entities;
mod types;
mod validator;

pub use entities::*;
pub use types::*;
pub use validator::{Rule, SchemaValidator, ValidationErrors, Violation};
pub(crate) use validator::value_eq;
