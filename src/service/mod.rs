//! CrudService: generic create/find over a schema, plus the resources built on it.

mod crud;
mod password;
mod relation;
mod user;

pub use crud::CrudService;
pub use password::{hash_password, verify_password};
pub use relation::{unresolved_marker, RelationResolver};
pub use user::UserService;
