//! Shared types and business rules for PrintControl
//!
//! Domain enums, stock and billing arithmetic, and the validation helpers
//! used by the backend. Nothing here touches the database, so every rule can
//! be tested in isolation.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
