//! Storage seams for the atoms.
//!
//! Services are written against these traits. `DynamoStore` and
//! `S3BlobStore` back them in production, `MemoryStore` and
//! `MemoryBlobStore` in tests and local runs. Every method that changes stock
//! is a single indivisible operation on the backing store.

use async_trait::async_trait;

use crate::books::Book;
use crate::borrows::{BorrowEntry, EntryKey};
use crate::error::AtomResult;
use crate::users::{UpdateUserPayload, UserProfile};

pub mod attrs;
pub mod dynamo;
pub mod memory;
pub mod s3;

pub use dynamo::DynamoStore;
pub use memory::{MemoryBlobStore, MemoryStore};
pub use s3::S3BlobStore;

/// Result of a transactional borrow commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Committed,
    /// The book reached zero stock before the commit; nothing was written.
    StockExhausted,
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books in the store's stable iteration order.
    async fn list_books(&self) -> AtomResult<Vec<Book>>;

    /// Books whose category equals `category`, in the same order as `list_books`.
    async fn books_in_category(&self, category: &str) -> AtomResult<Vec<Book>>;

    async fn get_book(&self, book_id: &str) -> AtomResult<Option<Book>>;

    async fn put_book(&self, book: &Book) -> AtomResult<()>;

    /// Returns false when the book did not exist.
    async fn delete_book(&self, book_id: &str) -> AtomResult<bool>;

    /// Atomic decrement-if-positive. Returns false when stock was already zero.
    async fn decrement_if_positive(&self, book_id: &str) -> AtomResult<bool>;

    /// Atomic +1. Returns the new stock.
    async fn increment(&self, book_id: &str) -> AtomResult<u32>;

    /// Add `delta` to the stock, clamping at zero. Returns the new stock.
    async fn adjust_stock(&self, book_id: &str, delta: i64) -> AtomResult<u32>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> AtomResult<Option<UserProfile>>;

    /// Create the profile unless one exists. Returns false if it already existed.
    async fn create_profile(&self, profile: &UserProfile) -> AtomResult<bool>;

    async fn update_profile(&self, user_id: &str, payload: &UpdateUserPayload) -> AtomResult<()>;

    async fn set_role(&self, user_id: &str, role: &str) -> AtomResult<()>;

    async fn list_profiles(&self) -> AtomResult<Vec<UserProfile>>;

    /// Append to the end of the user's borrow sequence in one write.
    async fn append_borrow(&self, user_id: &str, entry: &BorrowEntry) -> AtomResult<()>;

    /// Remove the first entry matching `key`. `None` means nothing matched
    /// and the sequence is unchanged.
    async fn remove_borrow(&self, user_id: &str, key: &EntryKey) -> AtomResult<Option<BorrowEntry>>;
}

/// The two-record commits of the borrow/return workflow, each applied as one
/// transaction so stock and borrow records never diverge.
#[async_trait]
pub trait LedgerStore: BookStore + ProfileStore {
    /// Decrement `book_id` if positive and append `entry` to `user_id`, or do neither.
    async fn commit_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        entry: &BorrowEntry,
    ) -> AtomResult<CommitStatus>;

    /// Remove the entry matching `key` and, when `book_id` is given, increment
    /// that book, or do neither. `None` means no entry matched.
    async fn commit_return(
        &self,
        book_id: Option<&str>,
        user_id: &str,
        key: &EntryKey,
    ) -> AtomResult<Option<BorrowEntry>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the object and return a URL it can be fetched from.
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AtomResult<String>;

    async fn delete_object(&self, key: &str) -> AtomResult<()>;
}
