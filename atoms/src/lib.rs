//! Domain atoms for the library backend.
//!
//! Each atom owns its model, the service functions that run against the
//! store traits, and thin `lambda_http` handlers. Orchestration across atoms
//! lives in the blocks.

pub mod books;
pub mod borrows;
pub mod error;
pub mod http;
pub mod media;
pub mod store;
pub mod users;

pub use error::{AtomError, AtomResult};
