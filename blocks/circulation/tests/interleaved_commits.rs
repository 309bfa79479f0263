//! Workflow behaviour when another request changes the ledger between the
//! inventory check and the commit.

use std::sync::Mutex;

use async_trait::async_trait;
use circulation_block::{borrow_book, return_book, BorrowOutcome, BorrowRequest, ReturnRequest};
use libris_atoms::books::Book;
use libris_atoms::borrows::{BorrowEntry, EntryKey};
use libris_atoms::store::{
    BookStore, CommitStatus, LedgerStore, MemoryBlobStore, MemoryStore, ProfileStore,
};
use libris_atoms::users::{Role, UpdateUserPayload, UserProfile};
use libris_atoms::{AtomError, AtomResult};

const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// A concurrent change applied once, right before the first ledger commit.
enum Interference {
    ExhaustBook(String),
    DropEntry { user_id: String, key: EntryKey },
}

struct Interleaved {
    inner: MemoryStore,
    pending: Mutex<Option<Interference>>,
}

impl Interleaved {
    fn new(inner: MemoryStore, interference: Interference) -> Self {
        Self {
            inner,
            pending: Mutex::new(Some(interference)),
        }
    }

    async fn interfere(&self) {
        let pending = self.pending.lock().unwrap().take();
        match pending {
            Some(Interference::ExhaustBook(book_id)) => {
                while self.inner.decrement_if_positive(&book_id).await.unwrap() {}
            }
            Some(Interference::DropEntry { user_id, key }) => {
                self.inner.remove_borrow(&user_id, &key).await.unwrap();
            }
            None => {}
        }
    }
}

#[async_trait]
impl BookStore for Interleaved {
    async fn list_books(&self) -> AtomResult<Vec<Book>> {
        self.inner.list_books().await
    }

    async fn books_in_category(&self, category: &str) -> AtomResult<Vec<Book>> {
        self.inner.books_in_category(category).await
    }

    async fn get_book(&self, book_id: &str) -> AtomResult<Option<Book>> {
        self.inner.get_book(book_id).await
    }

    async fn put_book(&self, book: &Book) -> AtomResult<()> {
        self.inner.put_book(book).await
    }

    async fn delete_book(&self, book_id: &str) -> AtomResult<bool> {
        self.inner.delete_book(book_id).await
    }

    async fn decrement_if_positive(&self, book_id: &str) -> AtomResult<bool> {
        self.inner.decrement_if_positive(book_id).await
    }

    async fn increment(&self, book_id: &str) -> AtomResult<u32> {
        self.inner.increment(book_id).await
    }

    async fn adjust_stock(&self, book_id: &str, delta: i64) -> AtomResult<u32> {
        self.inner.adjust_stock(book_id, delta).await
    }
}

#[async_trait]
impl ProfileStore for Interleaved {
    async fn get_profile(&self, user_id: &str) -> AtomResult<Option<UserProfile>> {
        self.inner.get_profile(user_id).await
    }

    async fn create_profile(&self, profile: &UserProfile) -> AtomResult<bool> {
        self.inner.create_profile(profile).await
    }

    async fn update_profile(&self, user_id: &str, payload: &UpdateUserPayload) -> AtomResult<()> {
        self.inner.update_profile(user_id, payload).await
    }

    async fn set_role(&self, user_id: &str, role: &str) -> AtomResult<()> {
        self.inner.set_role(user_id, role).await
    }

    async fn list_profiles(&self) -> AtomResult<Vec<UserProfile>> {
        self.inner.list_profiles().await
    }

    async fn append_borrow(&self, user_id: &str, entry: &BorrowEntry) -> AtomResult<()> {
        self.inner.append_borrow(user_id, entry).await
    }

    async fn remove_borrow(&self, user_id: &str, key: &EntryKey) -> AtomResult<Option<BorrowEntry>> {
        self.inner.remove_borrow(user_id, key).await
    }
}

#[async_trait]
impl LedgerStore for Interleaved {
    async fn commit_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        entry: &BorrowEntry,
    ) -> AtomResult<CommitStatus> {
        self.interfere().await;
        self.inner.commit_borrow(book_id, user_id, entry).await
    }

    async fn commit_return(
        &self,
        book_id: Option<&str>,
        user_id: &str,
        key: &EntryKey,
    ) -> AtomResult<Option<BorrowEntry>> {
        self.interfere().await;
        self.inner.commit_return(book_id, user_id, key).await
    }
}

fn book(id: &str, category: &str, stock: u32) -> Book {
    Book {
        book_id: id.into(),
        name: format!("copy {}", id),
        category: category.into(),
        stock,
        cover_url: format!("/{}.jpg", category),
        created_at: "2024-01-01T00:00:00Z".into(),
    }
}

async fn seeded(books: &[Book], user_id: &str) -> MemoryStore {
    let store = MemoryStore::new();
    for b in books {
        store.put_book(b).await.unwrap();
    }
    store
        .create_profile(&UserProfile::first_sign_in(
            user_id,
            &format!("{}@college.ac.th", user_id),
            Role::User,
        ))
        .await
        .unwrap();
    store
}

fn borrow_req() -> BorrowRequest {
    BorrowRequest {
        category: "500".into(),
        book_name: "Intro Physics".into(),
        photo: PNG.into(),
    }
}

#[tokio::test]
async fn borrow_moves_to_the_next_record_when_the_first_runs_dry() {
    let store = seeded(&[book("a", "500", 1), book("b", "500", 1)], "u1").await;
    let ledger = Interleaved::new(store, Interference::ExhaustBook("a".into()));
    let blobs = MemoryBlobStore::new();

    let outcome = borrow_book(&ledger, &blobs, "u1", &borrow_req()).await.unwrap();
    let receipt = match outcome {
        BorrowOutcome::Committed(r) => r,
        other => panic!("expected a commit on the second record, got {:?}", other),
    };

    assert_eq!(receipt.book_id, "b");
    assert_eq!(ledger.get_book("a").await.unwrap().unwrap().stock, 0);
    assert_eq!(ledger.get_book("b").await.unwrap().unwrap().stock, 0);
    let borrows = ledger.get_profile("u1").await.unwrap().unwrap().borrows;
    assert_eq!(borrows, vec![receipt.entry.clone()]);
    assert_eq!(blobs.len(), 1);
    assert!(blobs.contains(receipt.entry.photo_url.trim_start_matches("memory://")));
}

#[tokio::test]
async fn borrow_losing_the_only_record_is_out_of_stock_and_drops_the_photo() {
    let store = seeded(&[book("a", "500", 1)], "u1").await;
    let ledger = Interleaved::new(store, Interference::ExhaustBook("a".into()));
    let blobs = MemoryBlobStore::new();

    let outcome = borrow_book(&ledger, &blobs, "u1", &borrow_req()).await.unwrap();

    assert_eq!(outcome, BorrowOutcome::OutOfStock { category: "500".into() });
    assert_eq!(ledger.get_book("a").await.unwrap().unwrap().stock, 0);
    assert!(ledger.get_profile("u1").await.unwrap().unwrap().borrows.is_empty());
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn return_of_an_entry_removed_mid_flight_is_not_found_and_drops_the_photo() {
    let store = seeded(&[book("a", "500", 0)], "u1").await;
    let entry = BorrowEntry::new("Intro Physics", "500", "memory://borrows/u1/old.png");
    store.append_borrow("u1", &entry).await.unwrap();
    let key = EntryKey::Id(entry.entry_id.clone());

    let ledger = Interleaved::new(
        store,
        Interference::DropEntry {
            user_id: "u1".into(),
            key: key.clone(),
        },
    );
    let blobs = MemoryBlobStore::new();

    let result = return_book(
        &ledger,
        &blobs,
        "u1",
        &ReturnRequest {
            key,
            photo: PNG.into(),
        },
    )
    .await;

    assert!(matches!(result, Err(AtomError::NotFound(_))), "{:?}", result);
    assert_eq!(ledger.get_book("a").await.unwrap().unwrap().stock, 0);
    assert!(ledger.get_profile("u1").await.unwrap().unwrap().borrows.is_empty());
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn committed_return_keeps_its_photo() {
    let store = seeded(&[book("a", "500", 0)], "u1").await;
    let entry = BorrowEntry::new("Intro Physics", "500", "memory://borrows/u1/old.png");
    store.append_borrow("u1", &entry).await.unwrap();
    let blobs = MemoryBlobStore::new();

    let receipt = return_book(
        &store,
        &blobs,
        "u1",
        &ReturnRequest {
            key: EntryKey::Id(entry.entry_id.clone()),
            photo: PNG.into(),
        },
    )
    .await
    .unwrap();

    assert_eq!(receipt.entry, entry);
    assert_eq!(receipt.book_id.as_deref(), Some("a"));
    assert!(receipt.return_photo_url.starts_with("memory://returns/u1/"));
    assert!(blobs.contains(receipt.return_photo_url.trim_start_matches("memory://")));
    assert_eq!(store.get_book("a").await.unwrap().unwrap().stock, 1);
}
