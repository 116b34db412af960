//! Shared domain types for the warehouse inventory backend
//!
//! Entities, status machines, money arithmetic and document numbering.
//! Nothing in this crate performs I/O; persistence and transactions live in
//! the backend.

pub mod error;
pub mod models;
pub mod numbering;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
