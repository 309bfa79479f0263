pub mod http;
pub mod model;
pub mod service;

pub use http::*;
pub use model::{position_of, BorrowEntry, EntryKey};
pub use service::*;
