pub mod http;
pub mod model;
pub mod service;

pub use http::*;
pub use model::{AdjustStockPayload, Book, Category, CategoryView, CreateBookPayload, CATEGORIES};
pub use service::*;
