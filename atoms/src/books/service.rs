use super::model::{Book, Category, CreateBookPayload};
use crate::error::{AtomError, AtomResult};
use crate::store::BookStore;

/// First book of `category` with stock left, in store order.
pub async fn find_available<S>(store: &S, category: &str) -> AtomResult<Option<Book>>
where
    S: BookStore + ?Sized,
{
    let books = store.books_in_category(category).await?;
    tracing::debug!(category, candidates = books.len(), "🔍 inventory check");
    Ok(books.into_iter().find(|b| b.category == category && b.stock > 0))
}

/// Take one copy of `book_id`. Fails with `OutOfStock` instead of going below zero.
pub async fn decrement_stock<S>(store: &S, book_id: &str) -> AtomResult<()>
where
    S: BookStore + ?Sized,
{
    if store.decrement_if_positive(book_id).await? {
        return Ok(());
    }
    let category = store
        .get_book(book_id)
        .await?
        .map(|b| b.category)
        .unwrap_or_default();
    Err(AtomError::OutOfStock { category })
}

/// Put one copy back into the category pool, on the first record of the
/// category. Returns the updated record, or `None` when the category is empty.
pub async fn increment_stock<S>(store: &S, category: &str) -> AtomResult<Option<Book>>
where
    S: BookStore + ?Sized,
{
    let Some(mut book) = store.books_in_category(category).await?.into_iter().next() else {
        tracing::warn!(category, "⚠️ no book record to return stock to");
        return Ok(None);
    };
    book.stock = store.increment(&book.book_id).await?;
    Ok(Some(book))
}

pub async fn list_books<S>(store: &S, category: Option<&str>) -> AtomResult<Vec<Book>>
where
    S: BookStore + ?Sized,
{
    match category {
        Some(category) => store.books_in_category(category).await,
        None => store.list_books().await,
    }
}

pub async fn create_book<S>(store: &S, payload: CreateBookPayload) -> AtomResult<Book>
where
    S: BookStore + ?Sized,
{
    let category = Category::lookup(&payload.category)
        .ok_or_else(|| AtomError::validation(format!("Unknown category '{}'", payload.category)))?;

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| category.name.to_string());

    let book = Book {
        book_id: uuid::Uuid::new_v4().to_string(),
        name,
        category: category.code.to_string(),
        stock: payload.stock,
        cover_url: category.cover_url(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    store.put_book(&book).await?;
    tracing::info!(book_id = %book.book_id, category = %book.category, stock = book.stock, "📚 book created");
    Ok(book)
}

pub async fn delete_book<S>(store: &S, book_id: &str) -> AtomResult<()>
where
    S: BookStore + ?Sized,
{
    if !store.delete_book(book_id).await? {
        return Err(AtomError::NotFound(format!("Book {}", book_id)));
    }
    tracing::info!(book_id, "🗑️ book deleted");
    Ok(())
}

/// Staff stock correction; clamps at zero and returns the updated record.
pub async fn adjust_stock<S>(store: &S, book_id: &str, delta: i64) -> AtomResult<Book>
where
    S: BookStore + ?Sized,
{
    let stock = store.adjust_stock(book_id, delta).await?;
    let mut book = store
        .get_book(book_id)
        .await?
        .ok_or_else(|| AtomError::NotFound(format!("Book {}", book_id)))?;
    book.stock = stock;
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (category, stock) in [("500", 0), ("600", 4), ("500", 2), ("500", 5)] {
            create_book(
                &store,
                CreateBookPayload {
                    category: category.to_string(),
                    name: None,
                    stock,
                },
            )
            .await
            .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn find_available_returns_first_stocked_record_of_category() {
        let store = seeded().await;
        let found = find_available(&store, "500").await.unwrap().expect("stock in 500");
        assert_eq!(found.category, "500");
        assert_eq!(found.stock, 2);
        assert!(find_available(&store, "900").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_available_is_none_when_pool_is_empty() {
        let store = MemoryStore::new();
        let book = create_book(
            &store,
            CreateBookPayload {
                category: "500".into(),
                name: Some("Intro Physics".into()),
                stock: 1,
            },
        )
        .await
        .unwrap();
        decrement_stock(&store, &book.book_id).await.unwrap();
        assert!(find_available(&store, "500").await.unwrap().is_none());
        assert_eq!(
            decrement_stock(&store, &book.book_id).await,
            Err(AtomError::OutOfStock { category: "500".into() })
        );
    }

    #[tokio::test]
    async fn increment_targets_first_record_in_category() {
        let store = seeded().await;
        let books = store.books_in_category("500").await.unwrap();
        let bumped = increment_stock(&store, "500").await.unwrap().unwrap();
        assert_eq!(bumped.book_id, books[0].book_id);
        assert_eq!(bumped.stock, 1);
        assert!(increment_stock(&store, "100").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_book_rejects_unknown_category_and_defaults_name() {
        let store = MemoryStore::new();
        let err = create_book(
            &store,
            CreateBookPayload {
                category: "550".into(),
                name: None,
                stock: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AtomError::Validation(_)));

        let book = create_book(
            &store,
            CreateBookPayload {
                category: "700".into(),
                name: Some("   ".into()),
                stock: 1,
            },
        )
        .await
        .unwrap();
        assert_eq!(book.name, "Arts");
        assert_eq!(book.cover_url, "/700.jpg");
    }

    #[tokio::test]
    async fn delete_missing_book_is_not_found() {
        let store = seeded().await;
        assert!(matches!(
            delete_book(&store, "nope").await,
            Err(AtomError::NotFound(_))
        ));
        let first = store.list_books().await.unwrap()[0].clone();
        delete_book(&store, &first.book_id).await.unwrap();
        assert_eq!(store.list_books().await.unwrap().len(), 3);
    }
}
