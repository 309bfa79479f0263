use lambda_http::{http::StatusCode, Body, Error, Response};

use super::model::{AdjustStockPayload, CategoryView, CreateBookPayload, CATEGORIES};
use super::service::{adjust_stock, create_book, delete_book, list_books};
use crate::http::{error_response, json_response, no_content, parse_body};
use crate::store::BookStore;

/// HTTP Handler: GET /categories
pub fn list_categories_handler() -> Result<Response<Body>, Error> {
    let categories: Vec<CategoryView> = CATEGORIES.iter().copied().map(CategoryView::from).collect();
    json_response(StatusCode::OK, &categories)
}

/// HTTP Handler: GET /books?category=
pub async fn list_books_handler<S>(store: &S, category: Option<&str>) -> Result<Response<Body>, Error>
where
    S: BookStore + ?Sized,
{
    match list_books(store, category).await {
        Ok(books) => json_response(StatusCode::OK, &books),
        Err(e) => {
            tracing::error!("❌ list_books_handler failed: category={:?}, error={}", category, e);
            error_response(&e)
        }
    }
}

/// HTTP Handler: POST /books
pub async fn create_book_handler<S>(store: &S, body: &[u8]) -> Result<Response<Body>, Error>
where
    S: BookStore + ?Sized,
{
    let payload: CreateBookPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    match create_book(store, payload).await {
        Ok(book) => json_response(StatusCode::CREATED, &book),
        Err(e) => {
            tracing::error!("❌ create_book_handler failed: {}", e);
            error_response(&e)
        }
    }
}

/// HTTP Handler: PATCH /books/{id}/stock
pub async fn adjust_stock_handler<S>(store: &S, book_id: &str, body: &[u8]) -> Result<Response<Body>, Error>
where
    S: BookStore + ?Sized,
{
    let payload: AdjustStockPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    match adjust_stock(store, book_id, payload.delta).await {
        Ok(book) => {
            tracing::info!(book_id, delta = payload.delta, stock = book.stock, "📦 stock adjusted");
            json_response(StatusCode::OK, &book)
        }
        Err(e) => error_response(&e),
    }
}

/// HTTP Handler: DELETE /books/{id}
pub async fn delete_book_handler<S>(store: &S, book_id: &str) -> Result<Response<Body>, Error>
where
    S: BookStore + ?Sized,
{
    match delete_book(store, book_id).await {
        Ok(()) => no_content(),
        Err(e) => error_response(&e),
    }
}
